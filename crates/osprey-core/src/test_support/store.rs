//! In-memory `Collection` used by translator and execution tests.
//!
//! Interprets the document grammars the translators emit: query filters,
//! sort documents, inclusion projections, and the pipeline stages the
//! lowering produces. Semantics follow the store the translators target,
//! not the translators themselves, so round-trip bugs stay visible.

use crate::{
    error::StoreError,
    exec::{Collection, FindOptions},
};
use bson::{Bson, Document};
use std::cmp::Ordering;

///
/// InMemoryCollection
///

pub(crate) struct InMemoryCollection {
    docs: Vec<Document>,
}

impl InMemoryCollection {
    pub(crate) fn new(docs: Vec<Document>) -> Self {
        Self { docs }
    }

    fn matching(&self, filter: &Document) -> Vec<Document> {
        self.docs
            .iter()
            .filter(|doc| matches(doc, filter))
            .cloned()
            .collect()
    }
}

impl Collection for InMemoryCollection {
    fn find(&self, options: &FindOptions) -> Result<Vec<Document>, StoreError> {
        let mut rows = self.matching(&options.filter);
        if let Some(sort) = &options.sort {
            sort_rows(&mut rows, sort);
        }
        let rows = window(rows, options.skip, options.limit);
        match &options.projection {
            Some(projection) => Ok(rows
                .into_iter()
                .map(|row| apply_inclusion(&row, projection))
                .collect()),
            None => Ok(rows),
        }
    }

    fn count(
        &self,
        filter: &Document,
        skip: Option<u64>,
        limit: Option<u64>,
    ) -> Result<u64, StoreError> {
        let total = self.matching(filter).len() as u64;
        let after_skip = total.saturating_sub(skip.unwrap_or(0));
        Ok(match limit {
            Some(limit) => after_skip.min(limit),
            None => after_skip,
        })
    }

    fn distinct(&self, field: &str, filter: &Document) -> Result<Vec<Bson>, StoreError> {
        let mut values = Vec::new();
        for doc in self.matching(filter) {
            match dotted_get(&doc, field) {
                Some(Bson::Array(items)) => {
                    for item in items {
                        push_unique(&mut values, item.clone());
                    }
                }
                Some(value) => push_unique(&mut values, value.clone()),
                None => {}
            }
        }
        Ok(values)
    }

    fn aggregate(&self, stages: &[Document]) -> Result<Vec<Document>, StoreError> {
        let mut rows = self.docs.clone();
        for stage in stages {
            let Some((name, body)) = stage.iter().next() else {
                return Err(StoreError::new("empty pipeline stage"));
            };
            rows = match name.as_str() {
                "$match" => {
                    let Bson::Document(filter) = body else {
                        return Err(StoreError::new("$match expects a document"));
                    };
                    rows.into_iter().filter(|row| matches(row, filter)).collect()
                }
                "$project" => {
                    let Bson::Document(spec) = body else {
                        return Err(StoreError::new("$project expects a document"));
                    };
                    rows.iter().map(|row| project_row(row, spec)).collect()
                }
                "$group" => {
                    let Bson::Document(spec) = body else {
                        return Err(StoreError::new("$group expects a document"));
                    };
                    group_rows(&rows, spec)?
                }
                "$sort" => {
                    let Bson::Document(spec) = body else {
                        return Err(StoreError::new("$sort expects a document"));
                    };
                    sort_rows(&mut rows, spec);
                    rows
                }
                "$skip" => {
                    let n = integer(body)
                        .ok_or_else(|| StoreError::new("$skip expects an integer"))?;
                    window(rows, Some(n.max(0) as u64), None)
                }
                "$limit" => {
                    let n = integer(body)
                        .ok_or_else(|| StoreError::new("$limit expects an integer"))?;
                    window(rows, None, Some(n.max(0) as u64))
                }
                other => {
                    return Err(StoreError::new(format!("unsupported stage {other}")));
                }
            };
        }
        Ok(rows)
    }
}

// ---------------------------------------------------------------------------
// filter matching

fn matches(doc: &Document, filter: &Document) -> bool {
    filter.iter().all(|(key, condition)| match key.as_str() {
        "$and" => branch_docs(condition)
            .iter()
            .all(|branch| matches(doc, branch)),
        "$or" => branch_docs(condition)
            .iter()
            .any(|branch| matches(doc, branch)),
        "$nor" => !branch_docs(condition)
            .iter()
            .any(|branch| matches(doc, branch)),
        path => field_matches(dotted_get(doc, path), condition),
    })
}

fn branch_docs(condition: &Bson) -> Vec<&Document> {
    match condition {
        Bson::Array(items) => items
            .iter()
            .filter_map(|item| match item {
                Bson::Document(doc) => Some(doc),
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    }
}

fn field_matches(value: Option<&Bson>, condition: &Bson) -> bool {
    match condition {
        Bson::Document(ops) if is_operator_doc(ops) => ops
            .iter()
            .all(|(op, operand)| operator_matches(value, op, operand)),
        Bson::RegularExpression(regex) => regex_matches(value, &regex.pattern, &regex.options),
        literal => equality_matches(value, literal),
    }
}

fn operator_matches(value: Option<&Bson>, op: &str, operand: &Bson) -> bool {
    match op {
        "$eq" => equality_matches(value, operand),
        "$ne" => !equality_matches(value, operand),
        "$lt" => ordered_matches(value, operand, Ordering::is_lt),
        "$lte" => ordered_matches(value, operand, Ordering::is_le),
        "$gt" => ordered_matches(value, operand, Ordering::is_gt),
        "$gte" => ordered_matches(value, operand, Ordering::is_ge),
        "$in" => match operand {
            Bson::Array(items) => items.iter().any(|item| equality_matches(value, item)),
            _ => false,
        },
        "$nin" => match operand {
            Bson::Array(items) => !items.iter().any(|item| equality_matches(value, item)),
            _ => false,
        },
        "$all" => match (value, operand) {
            (Some(Bson::Array(elements)), Bson::Array(required)) => required
                .iter()
                .all(|item| elements.iter().any(|element| bson_eq(element, item))),
            _ => false,
        },
        "$size" => match (value, integer(operand)) {
            (Some(Bson::Array(elements)), Some(n)) => elements.len() as i64 == n,
            _ => false,
        },
        "$exists" => {
            let wanted = matches!(operand, Bson::Boolean(true));
            value.is_some() == wanted
        }
        "$not" => !field_matches(value, operand),
        _ => false,
    }
}

fn equality_matches(value: Option<&Bson>, literal: &Bson) -> bool {
    match value {
        None | Some(Bson::Null) => matches!(literal, Bson::Null),
        Some(value) => {
            if bson_eq(value, literal) {
                return true;
            }
            // an array field matches when any element does
            match value {
                Bson::Array(elements) => {
                    elements.iter().any(|element| bson_eq(element, literal))
                }
                _ => false,
            }
        }
    }
}

fn ordered_matches(
    value: Option<&Bson>,
    operand: &Bson,
    accept: impl Fn(Ordering) -> bool,
) -> bool {
    match value {
        Some(value) => comparable(value, operand).is_some_and(accept),
        None => false,
    }
}

/// Comparison within one type bracket; values of different brackets are
/// incomparable in filters.
fn comparable(a: &Bson, b: &Bson) -> Option<Ordering> {
    if let (Some(x), Some(y)) = (numeric(a), numeric(b)) {
        return x.partial_cmp(&y);
    }
    match (a, b) {
        (Bson::String(x), Bson::String(y)) => Some(x.cmp(y)),
        (Bson::Boolean(x), Bson::Boolean(y)) => Some(x.cmp(y)),
        (Bson::DateTime(x), Bson::DateTime(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

fn bson_eq(a: &Bson, b: &Bson) -> bool {
    if let (Some(x), Some(y)) = (numeric(a), numeric(b)) {
        return x == y;
    }
    a == b
}

fn is_operator_doc(doc: &Document) -> bool {
    doc.keys().next().is_some_and(|key| key.starts_with('$'))
}

/// Match the anchored literal regexes the predicate translator emits:
/// an optional `^`, an escaped fragment, an optional `$`, and the `i`
/// option.
fn regex_matches(value: Option<&Bson>, pattern: &str, options: &str) -> bool {
    let Some(Bson::String(text)) = value else {
        return false;
    };

    let mut chars: Vec<char> = pattern.chars().collect();
    let anchored_start = chars.first() == Some(&'^');
    if anchored_start {
        chars.remove(0);
    }
    let mut anchored_end = false;
    if chars.last() == Some(&'$') {
        let escaped = chars.len() >= 2 && chars[chars.len() - 2] == '\\';
        if !escaped {
            anchored_end = true;
            chars.pop();
        }
    }
    let mut fragment = String::with_capacity(chars.len());
    let mut iter = chars.into_iter();
    while let Some(c) = iter.next() {
        if c == '\\' {
            if let Some(next) = iter.next() {
                fragment.push(next);
            }
        } else {
            fragment.push(c);
        }
    }

    let (text, fragment) = if options.contains('i') {
        (text.to_lowercase(), fragment.to_lowercase())
    } else {
        (text.clone(), fragment)
    };

    match (anchored_start, anchored_end) {
        (true, true) => text == fragment,
        (true, false) => text.starts_with(&fragment),
        (false, true) => text.ends_with(&fragment),
        (false, false) => text.contains(&fragment),
    }
}

// ---------------------------------------------------------------------------
// sorting and windows

fn sort_rows(rows: &mut [Document], sort: &Document) {
    rows.sort_by(|a, b| {
        for (path, direction) in sort {
            let ordering = total_order(
                dotted_get(a, path).unwrap_or(&Bson::Null),
                dotted_get(b, path).unwrap_or(&Bson::Null),
            );
            let ordering = if integer(direction) == Some(-1) {
                ordering.reverse()
            } else {
                ordering
            };
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        Ordering::Equal
    });
}

/// Cross-type total order used for sorting: null and missing first, then
/// numbers, strings, documents, arrays, booleans, dates.
fn total_order(a: &Bson, b: &Bson) -> Ordering {
    let rank_a = type_rank(a);
    let rank_b = type_rank(b);
    if rank_a != rank_b {
        return rank_a.cmp(&rank_b);
    }
    comparable(a, b).unwrap_or(Ordering::Equal)
}

fn type_rank(value: &Bson) -> u8 {
    match value {
        Bson::Null => 0,
        Bson::Int32(_) | Bson::Int64(_) | Bson::Double(_) => 1,
        Bson::String(_) => 2,
        Bson::Document(_) => 3,
        Bson::Array(_) => 4,
        Bson::Boolean(_) => 5,
        Bson::DateTime(_) => 6,
        _ => 7,
    }
}

fn window(rows: Vec<Document>, skip: Option<u64>, limit: Option<u64>) -> Vec<Document> {
    let skip = skip.unwrap_or(0) as usize;
    let limit = limit.map_or(usize::MAX, |n| n as usize);
    rows.into_iter().skip(skip).take(limit).collect()
}

// ---------------------------------------------------------------------------
// projection

fn apply_inclusion(row: &Document, projection: &Document) -> Document {
    let mut out = Document::new();
    for path in projection.keys() {
        if let Some(value) = dotted_get(row, path) {
            dotted_insert(&mut out, path, value.clone());
        }
    }
    out
}

fn project_row(row: &Document, spec: &Document) -> Document {
    let mut out = Document::new();
    for (path, rule) in spec {
        if integer(rule) == Some(1) || matches!(rule, Bson::Boolean(true)) {
            if let Some(value) = dotted_get(row, path) {
                dotted_insert(&mut out, path, value.clone());
            }
        } else {
            dotted_insert(&mut out, path, eval(rule, row));
        }
    }
    out
}

// ---------------------------------------------------------------------------
// grouping

fn group_rows(rows: &[Document], spec: &Document) -> Result<Vec<Document>, StoreError> {
    let key_expr = spec
        .get("_id")
        .ok_or_else(|| StoreError::new("$group requires _id"))?;

    // first-seen group order keeps results deterministic
    let mut groups: Vec<(Bson, Vec<&Document>)> = Vec::new();
    for row in rows {
        let key = eval(key_expr, row);
        match groups.iter_mut().find(|(existing, _)| bson_eq(existing, &key)) {
            Some((_, members)) => members.push(row),
            None => groups.push((key, vec![row])),
        }
    }

    let mut out = Vec::with_capacity(groups.len());
    for (key, members) in groups {
        let mut doc = Document::new();
        doc.insert("_id", key);
        for (name, accumulator) in spec {
            if name == "_id" {
                continue;
            }
            let Bson::Document(accumulator) = accumulator else {
                return Err(StoreError::new("accumulators must be documents"));
            };
            let Some((op, argument)) = accumulator.iter().next() else {
                return Err(StoreError::new("empty accumulator"));
            };
            doc.insert(name.clone(), accumulate(op, argument, &members)?);
        }
        out.push(doc);
    }
    Ok(out)
}

fn accumulate(op: &str, argument: &Bson, members: &[&Document]) -> Result<Bson, StoreError> {
    let values: Vec<Bson> = members.iter().map(|row| eval(argument, row)).collect();
    match op {
        "$sum" => Ok(numeric_sum(&values)),
        "$avg" => {
            let numbers: Vec<f64> = values.iter().filter_map(numeric).collect();
            if numbers.is_empty() {
                Ok(Bson::Null)
            } else {
                Ok(Bson::Double(numbers.iter().sum::<f64>() / numbers.len() as f64))
            }
        }
        "$min" => Ok(extremum(&values, Ordering::Less)),
        "$max" => Ok(extremum(&values, Ordering::Greater)),
        "$first" => Ok(values.first().cloned().unwrap_or(Bson::Null)),
        "$last" => Ok(values.last().cloned().unwrap_or(Bson::Null)),
        "$push" => Ok(Bson::Array(values)),
        other => Err(StoreError::new(format!("unsupported accumulator {other}"))),
    }
}

fn numeric_sum(values: &[Bson]) -> Bson {
    let mut int_total: i64 = 0;
    let mut double_total: f64 = 0.0;
    let mut any_double = false;
    let mut any_int64 = false;
    for value in values {
        match value {
            Bson::Int32(n) => int_total = int_total.saturating_add(i64::from(*n)),
            Bson::Int64(n) => {
                any_int64 = true;
                int_total = int_total.saturating_add(*n);
            }
            Bson::Double(n) => {
                any_double = true;
                double_total += n;
            }
            _ => {}
        }
    }
    if any_double {
        Bson::Double(double_total + int_total as f64)
    } else if any_int64 || i32::try_from(int_total).is_err() {
        Bson::Int64(int_total)
    } else {
        Bson::Int32(int_total as i32)
    }
}

fn extremum(values: &[Bson], keep: Ordering) -> Bson {
    let mut best: Option<&Bson> = None;
    for value in values {
        if matches!(value, Bson::Null) {
            continue;
        }
        match best {
            None => best = Some(value),
            Some(current) => {
                if total_order(value, current) == keep {
                    best = Some(value);
                }
            }
        }
    }
    best.cloned().unwrap_or(Bson::Null)
}

// ---------------------------------------------------------------------------
// expression evaluation

fn eval(expr: &Bson, row: &Document) -> Bson {
    match expr {
        Bson::String(s) if s == "$$ROOT" => Bson::Document(row.clone()),
        Bson::String(s) if s.starts_with('$') => {
            dotted_get(row, &s[1..]).cloned().unwrap_or(Bson::Null)
        }
        Bson::Document(doc) if is_operator_doc(doc) => {
            let Some((op, operand)) = doc.iter().next() else {
                return Bson::Null;
            };
            eval_operator(op, operand, row)
        }
        Bson::Document(doc) => {
            let mut out = Document::new();
            for (key, value) in doc {
                out.insert(key.clone(), eval(value, row));
            }
            Bson::Document(out)
        }
        Bson::Array(items) => Bson::Array(items.iter().map(|item| eval(item, row)).collect()),
        scalar => scalar.clone(),
    }
}

fn eval_operator(op: &str, operand: &Bson, row: &Document) -> Bson {
    match op {
        "$literal" => operand.clone(),
        "$add" => fold_numeric(operand, row, 0.0, |acc, n| acc + n),
        "$multiply" => fold_numeric(operand, row, 1.0, |acc, n| acc * n),
        "$subtract" => binary_numeric(operand, row, |a, b| a - b),
        "$divide" => match operands(operand, row).as_slice() {
            [a, b] => match (numeric(a), numeric(b)) {
                (Some(x), Some(y)) if y != 0.0 => Bson::Double(x / y),
                _ => Bson::Null,
            },
            _ => Bson::Null,
        },
        "$mod" => match operands(operand, row).as_slice() {
            [a, b] => match (numeric(a), numeric(b)) {
                (Some(x), Some(y)) if y != 0.0 => narrow(x % y, a, b),
                _ => Bson::Null,
            },
            _ => Bson::Null,
        },
        "$concat" => {
            let mut out = String::new();
            for value in operands(operand, row) {
                match value {
                    Bson::String(s) => out.push_str(&s),
                    Bson::Null => return Bson::Null,
                    _ => return Bson::Null,
                }
            }
            Bson::String(out)
        }
        "$toLower" => match eval(operand, row) {
            Bson::String(s) => Bson::String(s.to_lowercase()),
            _ => Bson::String(String::new()),
        },
        "$toUpper" => match eval(operand, row) {
            Bson::String(s) => Bson::String(s.to_uppercase()),
            _ => Bson::String(String::new()),
        },
        "$substr" => match operands(operand, row).as_slice() {
            [Bson::String(s), start, len] => {
                let start = integer(start).unwrap_or(0).max(0) as usize;
                let len = integer(len).unwrap_or(0).max(0) as usize;
                Bson::String(s.chars().skip(start).take(len).collect())
            }
            _ => Bson::Null,
        },
        "$year" => date_part(operand, row, |(year, _, _)| year),
        "$month" => date_part(operand, row, |(_, month, _)| i64::from(month)),
        "$dayOfMonth" => date_part(operand, row, |(_, _, day)| i64::from(day)),
        // Sunday renders as 1; the epoch was a Thursday
        "$dayOfWeek" => time_part(operand, row, |millis| {
            (millis.div_euclid(86_400_000) + 4).rem_euclid(7) + 1
        }),
        "$dayOfYear" => date_part(operand, row, |(year, month, day)| {
            day_of_year(year, month, day)
        }),
        "$hour" => time_part(operand, row, |millis| {
            millis.rem_euclid(86_400_000) / 3_600_000
        }),
        "$minute" => time_part(operand, row, |millis| {
            millis.rem_euclid(3_600_000) / 60_000
        }),
        "$second" => time_part(operand, row, |millis| millis.rem_euclid(60_000) / 1000),
        "$millisecond" => time_part(operand, row, |millis| millis.rem_euclid(1000)),
        "$size" => match eval(operand, row) {
            Bson::Array(items) => Bson::Int32(items.len() as i32),
            _ => Bson::Null,
        },
        "$cond" => match operands(operand, row).as_slice() {
            [condition, then, otherwise] => {
                if truthy(condition) {
                    then.clone()
                } else {
                    otherwise.clone()
                }
            }
            _ => Bson::Null,
        },
        "$ifNull" => match operands(operand, row).as_slice() {
            [first, fallback] => {
                if matches!(first, Bson::Null) {
                    fallback.clone()
                } else {
                    first.clone()
                }
            }
            _ => Bson::Null,
        },
        "$eq" | "$ne" | "$lt" | "$lte" | "$gt" | "$gte" => {
            match operands(operand, row).as_slice() {
                [a, b] => {
                    let ordering = comparable(a, b);
                    let result = match op {
                        "$eq" => bson_eq(a, b),
                        "$ne" => !bson_eq(a, b),
                        "$lt" => ordering.is_some_and(Ordering::is_lt),
                        "$lte" => ordering.is_some_and(Ordering::is_le),
                        "$gt" => ordering.is_some_and(Ordering::is_gt),
                        _ => ordering.is_some_and(Ordering::is_ge),
                    };
                    Bson::Boolean(result)
                }
                _ => Bson::Null,
            }
        }
        "$and" => Bson::Boolean(operands(operand, row).iter().all(truthy)),
        "$or" => Bson::Boolean(operands(operand, row).iter().any(truthy)),
        "$not" => match operands(operand, row).as_slice() {
            [value] => Bson::Boolean(!truthy(value)),
            _ => Bson::Null,
        },
        _ => Bson::Null,
    }
}

fn operands(operand: &Bson, row: &Document) -> Vec<Bson> {
    match operand {
        Bson::Array(items) => items.iter().map(|item| eval(item, row)).collect(),
        single => vec![eval(single, row)],
    }
}

fn fold_numeric(operand: &Bson, row: &Document, init: f64, fold: impl Fn(f64, f64) -> f64) -> Bson {
    let values = operands(operand, row);
    let mut acc = init;
    let mut all_int = true;
    for value in &values {
        match numeric(value) {
            Some(n) => {
                if matches!(value, Bson::Double(_)) {
                    all_int = false;
                }
                acc = fold(acc, n);
            }
            None => return Bson::Null,
        }
    }
    if all_int && acc.fract() == 0.0 {
        render_integer(acc, &values)
    } else {
        Bson::Double(acc)
    }
}

fn binary_numeric(operand: &Bson, row: &Document, apply: impl Fn(f64, f64) -> f64) -> Bson {
    match operands(operand, row).as_slice() {
        [a, b] => match (numeric(a), numeric(b)) {
            (Some(x), Some(y)) => narrow(apply(x, y), a, b),
            _ => Bson::Null,
        },
        _ => Bson::Null,
    }
}

fn narrow(result: f64, a: &Bson, b: &Bson) -> Bson {
    if matches!(a, Bson::Double(_)) || matches!(b, Bson::Double(_)) || result.fract() != 0.0 {
        Bson::Double(result)
    } else {
        render_integer(result, std::slice::from_ref(a))
    }
}

fn render_integer(value: f64, inputs: &[Bson]) -> Bson {
    let wide = value as i64;
    let any_int64 = inputs.iter().any(|input| matches!(input, Bson::Int64(_)));
    if any_int64 || i32::try_from(wide).is_err() {
        Bson::Int64(wide)
    } else {
        Bson::Int32(wide as i32)
    }
}

fn date_part(operand: &Bson, row: &Document, pick: impl Fn((i64, u32, u32)) -> i64) -> Bson {
    time_part(operand, row, |millis| {
        pick(civil_from_days(millis.div_euclid(86_400_000)))
    })
}

fn time_part(operand: &Bson, row: &Document, pick: impl Fn(i64) -> i64) -> Bson {
    match eval(operand, row) {
        Bson::DateTime(dt) => Bson::Int32(pick(dt.timestamp_millis()) as i32),
        _ => Bson::Null,
    }
}

fn day_of_year(year: i64, month: u32, day: u32) -> i64 {
    const BEFORE: [i64; 12] = [0, 31, 59, 90, 120, 151, 181, 212, 243, 273, 304, 334];
    let leap = (year % 4 == 0 && year % 100 != 0) || year % 400 == 0;
    BEFORE[(month - 1) as usize] + i64::from(day) + i64::from(leap && month > 2)
}

/// Gregorian calendar date from days since the epoch.
fn civil_from_days(days: i64) -> (i64, u32, u32) {
    let z = days + 719_468;
    let era = if z >= 0 { z } else { z - 146_096 } / 146_097;
    let doe = z - era * 146_097;
    let yoe = (doe - doe / 1460 + doe / 36_524 - doe / 146_096) / 365;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let day = doy - (153 * mp + 2) / 5 + 1;
    let month = if mp < 10 { mp + 3 } else { mp - 9 };
    let year = yoe + era * 400 + i64::from(month <= 2);
    (year, month as u32, day as u32)
}

// ---------------------------------------------------------------------------
// shared scalar helpers

fn numeric(value: &Bson) -> Option<f64> {
    match value {
        Bson::Int32(n) => Some(f64::from(*n)),
        Bson::Int64(n) => Some(*n as f64),
        Bson::Double(n) => Some(*n),
        _ => None,
    }
}

fn integer(value: &Bson) -> Option<i64> {
    match value {
        Bson::Int32(n) => Some(i64::from(*n)),
        Bson::Int64(n) => Some(*n),
        Bson::Double(n) if n.fract() == 0.0 => Some(*n as i64),
        _ => None,
    }
}

fn truthy(value: &Bson) -> bool {
    match value {
        Bson::Boolean(b) => *b,
        Bson::Null => false,
        other => numeric(other).is_none_or(|n| n != 0.0),
    }
}

fn push_unique(values: &mut Vec<Bson>, value: Bson) {
    if !values.iter().any(|existing| bson_eq(existing, &value)) {
        values.push(value);
    }
}

pub(crate) fn dotted_get<'doc>(doc: &'doc Document, path: &str) -> Option<&'doc Bson> {
    let mut current = doc;
    let mut segments = path.split('.').peekable();
    while let Some(segment) = segments.next() {
        let value = current.get(segment)?;
        if segments.peek().is_none() {
            return Some(value);
        }
        match value {
            Bson::Document(inner) => current = inner,
            _ => return None,
        }
    }
    None
}

fn dotted_insert(doc: &mut Document, path: &str, value: Bson) {
    match path.split_once('.') {
        None => {
            doc.insert(path, value);
        }
        Some((head, rest)) => {
            if !matches!(doc.get(head), Some(Bson::Document(_))) {
                doc.insert(head, Document::new());
            }
            if let Some(Bson::Document(inner)) = doc.get_mut(head) {
                dotted_insert(inner, rest, value);
            }
        }
    }
}

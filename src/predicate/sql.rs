//! Lowers a [`QuerySpec`] to a single parameterized SELECT.
//!
//! The output is plain SQL text with `?` placeholders plus the ordered
//! parameter vector, consumable by any relational driver. One generic
//! dialect is produced; per-dialect tuning is out of scope.

use super::{EntityAlias, Predicate, QuerySpec, Value};
use crate::types::SortDirection;
use std::fmt::Write;

/// A rendered statement: SQL text with `?` placeholders and the parameters
/// in placeholder order.
#[derive(Debug, Clone, PartialEq)]
pub struct SqlQuery {
	pub sql: String,
	pub params: Vec<Value>,
}

/// Renders the count form: `SELECT COUNT(*) …` without ordering or paging.
pub fn lower_count(spec: &QuerySpec) -> SqlQuery {
	let mut sql = String::from("SELECT COUNT(*) ");
	sql.push_str(from_clause(spec.root));
	let mut params = Vec::new();
	push_where(&mut sql, &mut params, &spec.predicates);
	SqlQuery { sql, params }
}

/// Renders the list form with projection, ordering and paging applied.
pub fn lower_list(spec: &QuerySpec) -> SqlQuery {
	let mut sql = String::from("SELECT ");
	sql.push_str(&spec.projection.join(", "));
	sql.push(' ');
	sql.push_str(from_clause(spec.root));

	let mut params = Vec::new();
	push_where(&mut sql, &mut params, &spec.predicates);

	if !spec.order.is_empty() {
		sql.push_str(" ORDER BY ");
		let terms: Vec<String> = spec
			.order
			.iter()
			.map(|key| {
				let direction = match key.direction {
					SortDirection::Ascending => "ASC",
					SortDirection::Descending => "DESC",
				};
				format!("{} {direction}", key.path)
			})
			.collect();
		sql.push_str(&terms.join(", "));
	}

	if spec.limit > 0 {
		sql.push_str(" LIMIT ?");
		params.push(Value::Int(spec.limit as i64));
	}
	if spec.offset > 0 {
		sql.push_str(" OFFSET ?");
		params.push(Value::Int(spec.offset as i64));
	}

	SqlQuery { sql, params }
}

const fn from_clause(root: EntityAlias) -> &'static str {
	match root {
		EntityAlias::Patient => "FROM patient",
		EntityAlias::Study => "FROM study JOIN patient ON study.patient_fk = patient.id",
		EntityAlias::Series => {
			"FROM series \
			 JOIN study ON series.study_fk = study.id \
			 JOIN patient ON study.patient_fk = patient.id"
		}
		EntityAlias::Instance => {
			"FROM instance \
			 JOIN series ON instance.series_fk = series.id \
			 JOIN study ON series.study_fk = study.id \
			 JOIN patient ON study.patient_fk = patient.id"
		}
	}
}

fn push_where(sql: &mut String, params: &mut Vec<Value>, predicates: &[Predicate]) {
	if predicates.is_empty() {
		return;
	}
	sql.push_str(" WHERE ");
	let mut first = true;
	for predicate in predicates {
		if !first {
			sql.push_str(" AND ");
		}
		first = false;
		render(sql, params, predicate);
	}
}

fn render(sql: &mut String, params: &mut Vec<Value>, predicate: &Predicate) {
	match predicate {
		Predicate::Eq { path, value } => binary(sql, params, path, "=", value),
		Predicate::Ne { path, value } => binary(sql, params, path, "<>", value),
		Predicate::Gt { path, value } => binary(sql, params, path, ">", value),
		Predicate::Ge { path, value } => binary(sql, params, path, ">=", value),
		Predicate::Lt { path, value } => binary(sql, params, path, "<", value),
		Predicate::Le { path, value } => binary(sql, params, path, "<=", value),
		Predicate::Between { path, low, high } => {
			let _ = write!(sql, "{path} BETWEEN ? AND ?");
			params.push(low.clone());
			params.push(high.clone());
		}
		Predicate::Like {
			path,
			pattern,
			escape,
			ignore_case,
		} => {
			if *ignore_case {
				let _ = write!(sql, "LOWER({path}) LIKE LOWER(?) ESCAPE '{escape}'");
			} else {
				let _ = write!(sql, "{path} LIKE ? ESCAPE '{escape}'");
			}
			params.push(Value::Str(pattern.clone()));
		}
		Predicate::In { path, values } => {
			if values.is_empty() {
				sql.push_str("1 = 0");
				return;
			}
			let placeholders = vec!["?"; values.len()].join(", ");
			let _ = write!(sql, "{path} IN ({placeholders})");
			params.extend(values.iter().cloned());
		}
		Predicate::And(all) => junction(sql, params, all, " AND ", "1 = 1"),
		Predicate::Or(any) => junction(sql, params, any, " OR ", "1 = 0"),
		Predicate::Exists(subquery) => {
			let _ = write!(
				sql,
				"EXISTS (SELECT 1 FROM {} WHERE {} = {}",
				subquery.entity.name(),
				subquery.correlation.0,
				subquery.correlation.1,
			);
			for predicate in &subquery.predicates {
				sql.push_str(" AND ");
				render(sql, params, predicate);
			}
			sql.push(')');
		}
	}
}

fn binary(sql: &mut String, params: &mut Vec<Value>, path: &str, op: &str, value: &Value) {
	let _ = write!(sql, "{path} {op} ?");
	params.push(value.clone());
}

fn junction(
	sql: &mut String,
	params: &mut Vec<Value>,
	parts: &[Predicate],
	separator: &str,
	empty: &str,
) {
	if parts.is_empty() {
		sql.push_str(empty);
		return;
	}
	sql.push('(');
	let mut first = true;
	for part in parts {
		if !first {
			sql.push_str(separator);
		}
		first = false;
		render(sql, params, part);
	}
	sql.push(')');
}

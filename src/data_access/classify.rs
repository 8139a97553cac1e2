//! Query shape detection for `execute_query`.
//!
//! A text heuristic: it can misjudge unusual statements (a CTE that ends in
//! an INSERT is treated as a read). Callers that know the shape should use
//! `query_one` / `query_many` / `execute` instead.

/// Store call shape used for a statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryKind {
    /// Read bounded to at most one row.
    One,
    /// Read returning any number of rows.
    Many,
    /// Statement that changes data.
    Mutation,
}

impl QueryKind {
    /// Classify `query` by its leading keyword and row bounds.
    pub fn classify(query: &str) -> Self {
        let normalized = query.replace('=', " = ").to_ascii_uppercase();
        let tokens: Vec<&str> = normalized
            .split_whitespace()
            .map(|t| t.trim_end_matches(';'))
            .collect();

        let is_read = matches!(
            tokens.first().copied(),
            Some("SELECT" | "WITH" | "PRAGMA" | "EXPLAIN" | "VALUES")
        );
        if !is_read {
            return QueryKind::Mutation;
        }

        if bounded_to_one_row(&tokens) {
            QueryKind::One
        } else {
            QueryKind::Many
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            QueryKind::One => "one",
            QueryKind::Many => "many",
            QueryKind::Mutation => "mutation",
        }
    }
}

fn bounded_to_one_row(tokens: &[&str]) -> bool {
    let limit_one = tokens.windows(2).any(|w| w[0] == "LIMIT" && w[1] == "1");
    let id_lookup = tokens
        .windows(3)
        .any(|w| matches!(w[0], "WHERE" | "AND") && is_id_column(w[1]) && w[2] == "=");
    limit_one || id_lookup
}

fn is_id_column(token: &str) -> bool {
    token == "ID" || token.ends_with(".ID")
}

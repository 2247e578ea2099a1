//! Pagination of load queries.

use serde::{Deserialize, Serialize};

use crate::cypher::{validate_identifier, Cypher, OrderBy};
use crate::error::{OgmError, OgmResult};

/// Page of a load query, ordered by `order_by_var_name.order_by_field`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    pub order_by_var_name: String,
    pub order_by_field: String,
    #[serde(default)]
    pub order_by_desc: bool,
    pub limit_per_page: i64,
    pub page_number: i64,
}

impl Pagination {
    pub fn new(
        order_by_var_name: impl Into<String>,
        order_by_field: impl Into<String>,
        limit_per_page: i64,
        page_number: i64,
    ) -> Self {
        Self {
            order_by_var_name: order_by_var_name.into(),
            order_by_field: order_by_field.into(),
            order_by_desc: false,
            limit_per_page,
            page_number,
        }
    }

    pub fn descending(mut self) -> Self {
        self.order_by_desc = true;
        self
    }

    pub fn validate(&self) -> OgmResult<()> {
        if self.limit_per_page <= 0 {
            return Err(OgmError::validation(format!(
                "pagination limit per page must be positive, got {}",
                self.limit_per_page
            )));
        }
        if self.page_number < 0 {
            return Err(OgmError::validation(format!(
                "pagination page number must not be negative, got {}",
                self.page_number
            )));
        }
        validate_identifier("order variable", &self.order_by_var_name)
            .and_then(|_| validate_identifier("order field", &self.order_by_field))
            .map_err(|_| {
                OgmError::validation(format!(
                    "pagination ordering '{}.{}' is invalid",
                    self.order_by_var_name, self.order_by_field
                ))
            })?;
        self.skip().map(|_| ())
    }

    /// Rows skipped before this page starts.
    pub fn skip(&self) -> OgmResult<i64> {
        self.limit_per_page
            .checked_mul(self.page_number)
            .ok_or_else(|| OgmError::validation("pagination offset overflows"))
    }

    pub fn order_by(&self) -> OrderBy {
        OrderBy {
            name: self.order_by_var_name.clone(),
            member: self.order_by_field.clone(),
            desc: self.order_by_desc,
        }
    }

    /// Validate, then append ordering, skip and limit to `query`.
    pub fn apply(&self, query: Cypher) -> OgmResult<Cypher> {
        self.validate()?;
        Ok(query
            .order_by(&self.order_by())?
            .skip(self.skip()?)
            .limit(self.limit_per_page))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_skip_offset() {
        let page = Pagination::new("n", "name", 10, 2);
        assert!(page.validate().is_ok());
        assert_eq!(page.skip().unwrap(), 20);
    }

    #[test]
    fn test_first_page_has_no_offset() {
        let page = Pagination::new("n", "name", 25, 0);
        assert_eq!(page.skip().unwrap(), 0);
    }

    #[test]
    fn test_invalid_limit() {
        let err = Pagination::new("n", "name", 0, 1).validate().unwrap_err();
        assert!(matches!(err, OgmError::ValidationError(_)));
    }

    #[test]
    fn test_negative_page() {
        let err = Pagination::new("n", "name", 10, -1).validate().unwrap_err();
        assert!(matches!(err, OgmError::ValidationError(_)));
    }

    #[test]
    fn test_missing_order_field() {
        let err = Pagination::new("n", "", 10, 1).validate().unwrap_err();
        assert!(matches!(err, OgmError::ValidationError(_)));
    }

    #[test]
    fn test_overflowing_offset() {
        let err = Pagination::new("n", "name", i64::MAX, 2).validate().unwrap_err();
        assert!(matches!(err, OgmError::ValidationError(_)));
    }

    #[test]
    fn test_apply_appends_clauses() {
        let query = Pagination::new("n", "name", 10, 3)
            .descending()
            .apply(Cypher::new("MATCH (n) RETURN n"))
            .unwrap();
        assert_eq!(
            query.as_str(),
            "MATCH (n) RETURN n ORDER BY n.name DESC SKIP 30 LIMIT 10"
        );
    }
}

use serde::Deserialize;
use utoipa::ToSchema;

use crate::models::OrderStatus;

#[derive(Debug, Deserialize, ToSchema)]
pub struct Pagination {
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

impl Pagination {
    pub fn normalize(&self) -> (i64, i64, i64) {
        let page = self.page.unwrap_or(1).max(1);
        let per_page = self.per_page.unwrap_or(20).clamp(1, 100);
        let offset = (page - 1) * per_page;
        (page, per_page, offset)
    }
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    Asc,
    Desc,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct OrderListQuery {
    #[serde(flatten)]
    pub pagination: Pagination,
    pub status: Option<OrderStatus>,
    pub sort_order: Option<SortOrder>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pagination_normalizes_out_of_range_input() {
        let p = Pagination {
            page: Some(0),
            per_page: Some(1000),
        };
        assert_eq!(p.normalize(), (1, 100, 0));

        let p = Pagination {
            page: None,
            per_page: None,
        };
        assert_eq!(p.normalize(), (1, 20, 0));
    }
}

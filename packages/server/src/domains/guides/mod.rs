pub mod query;

pub use query::{
    apply_filters, field_matches, find_by_field, page_params, paginate, parse_query_date,
    Pagination, DATE_FIELD_ALIASES, RESERVED_KEYS,
};

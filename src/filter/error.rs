use thiserror::Error;

/// Rejections raised while turning list parameters into a query
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FilterError {
    #[error("'{0}' is not a valid table name")]
    InvalidTable(String),

    #[error("'{0}' is not a valid column")]
    InvalidColumn(String),

    #[error("{0}")]
    InvalidWhere(String),

    #[error("operator '{0}' is not supported")]
    UnsupportedOperator(String),

    #[error("{0}")]
    InvalidOperatorData(String),

    #[error("{0}")]
    InvalidOrder(String),

    #[error("{0}")]
    InvalidPaging(String),
}

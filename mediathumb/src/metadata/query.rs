//! Parameterized query construction for the asset table.
//!
//! Column and table names come from closed enums; every value is bound as
//! a parameter, never formatted into the SQL text.

use rusqlite::types::Value;

/// Columns of the asset table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Column {
    Id,
    Path,
    MediaType,
    CaptureTime,
    Orientation,
    Location,
    AssetTable,
    Width,
    Height,
    LcdSize,
    ThumbSize,
    LcdVisitTime,
    ThumbnailReady,
    ThumbnailVisible,
}

impl Column {
    /// Every column, in row-mapping order.
    pub const ALL: [Column; 14] = [
        Column::Id,
        Column::Path,
        Column::MediaType,
        Column::CaptureTime,
        Column::Orientation,
        Column::Location,
        Column::AssetTable,
        Column::Width,
        Column::Height,
        Column::LcdSize,
        Column::ThumbSize,
        Column::LcdVisitTime,
        Column::ThumbnailReady,
        Column::ThumbnailVisible,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Column::Id => "id",
            Column::Path => "path",
            Column::MediaType => "media_type",
            Column::CaptureTime => "capture_time",
            Column::Orientation => "orientation",
            Column::Location => "location",
            Column::AssetTable => "asset_table",
            Column::Width => "width",
            Column::Height => "height",
            Column::LcdSize => "lcd_size",
            Column::ThumbSize => "thumb_size",
            Column::LcdVisitTime => "lcd_visit_time",
            Column::ThumbnailReady => "thumbnail_ready",
            Column::ThumbnailVisible => "thumbnail_visible",
        }
    }
}

/// Comparison operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cmp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl Cmp {
    fn sql(self) -> &'static str {
        match self {
            Cmp::Eq => "=",
            Cmp::Ne => "!=",
            Cmp::Lt => "<",
            Cmp::Le => "<=",
            Cmp::Gt => ">",
            Cmp::Ge => ">=",
        }
    }
}

#[derive(Debug, Clone)]
enum Projection {
    Columns(Vec<Column>),
    Count,
}

/// Builder for `SELECT` statements over the asset table.
///
/// ```
/// use mediathumb::metadata::{Cmp, Column, QueryBuilder};
///
/// let query = QueryBuilder::select(&[Column::Id])
///     .filter(Column::LcdVisitTime, Cmp::Gt, 0)
///     .order_by(Column::LcdVisitTime, true)
///     .limit(50);
/// assert_eq!(
///     query.sql(),
///     "SELECT id FROM assets WHERE lcd_visit_time > ?1 ORDER BY lcd_visit_time ASC LIMIT ?2"
/// );
/// assert_eq!(query.params().len(), 2);
/// ```
#[derive(Debug, Clone)]
pub struct QueryBuilder {
    projection: Projection,
    filters: Vec<String>,
    params: Vec<Value>,
    order: Vec<(Column, bool)>,
    limit: Option<i64>,
}

impl QueryBuilder {
    pub const TABLE: &'static str = "assets";

    pub fn select(columns: &[Column]) -> Self {
        Self::with_projection(Projection::Columns(columns.to_vec()))
    }

    pub fn count() -> Self {
        Self::with_projection(Projection::Count)
    }

    fn with_projection(projection: Projection) -> Self {
        Self {
            projection,
            filters: Vec::new(),
            params: Vec::new(),
            order: Vec::new(),
            limit: None,
        }
    }

    fn bind(&mut self, value: Value) -> String {
        self.params.push(value);
        format!("?{}", self.params.len())
    }

    /// `column <cmp> value`, ANDed with the other filters.
    pub fn filter(mut self, column: Column, cmp: Cmp, value: impl Into<Value>) -> Self {
        let placeholder = self.bind(value.into());
        self.filters
            .push(format!("{} {} {}", column.name(), cmp.sql(), placeholder));
        self
    }

    /// `column IN (values...)`. An empty list matches nothing.
    pub fn filter_in<V: Into<Value>>(mut self, column: Column, values: impl IntoIterator<Item = V>) -> Self {
        let placeholders: Vec<String> = values
            .into_iter()
            .map(|v| self.bind(v.into()))
            .collect();
        if placeholders.is_empty() {
            self.filters.push("0".to_string());
        } else {
            self.filters
                .push(format!("{} IN ({})", column.name(), placeholders.join(", ")));
        }
        self
    }

    pub fn order_by(mut self, column: Column, ascending: bool) -> Self {
        self.order.push((column, ascending));
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit as i64);
        self
    }

    /// The statement text with numbered placeholders.
    pub fn sql(&self) -> String {
        let projection = match &self.projection {
            Projection::Columns(columns) => columns
                .iter()
                .map(|c| c.name())
                .collect::<Vec<_>>()
                .join(", "),
            Projection::Count => "COUNT(*)".to_string(),
        };
        let mut sql = format!("SELECT {} FROM {}", projection, Self::TABLE);
        if !self.filters.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&self.filters.join(" AND "));
        }
        if !self.order.is_empty() {
            let order: Vec<String> = self
                .order
                .iter()
                .map(|(c, asc)| format!("{} {}", c.name(), if *asc { "ASC" } else { "DESC" }))
                .collect();
            sql.push_str(" ORDER BY ");
            sql.push_str(&order.join(", "));
        }
        if self.limit.is_some() {
            sql.push_str(&format!(" LIMIT ?{}", self.params.len() + 1));
        }
        sql
    }

    /// Bound parameters, in placeholder order.
    pub fn params(&self) -> Vec<Value> {
        let mut params = self.params.clone();
        if let Some(limit) = self.limit {
            params.push(Value::Integer(limit));
        }
        params
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_count_with_filters() {
        let query = QueryBuilder::count()
            .filter(Column::LcdVisitTime, Cmp::Ne, 0)
            .filter(Column::LcdVisitTime, Cmp::Lt, 500);
        assert_eq!(
            query.sql(),
            "SELECT COUNT(*) FROM assets WHERE lcd_visit_time != ?1 AND lcd_visit_time < ?2"
        );
        assert_eq!(query.params(), vec![Value::Integer(0), Value::Integer(500)]);
    }

    #[test]
    fn test_values_are_never_inlined() {
        let query = QueryBuilder::select(&[Column::Id])
            .filter(Column::Path, Cmp::Eq, "x'; DROP TABLE assets; --".to_string());
        assert!(!query.sql().contains("DROP"));
        assert_eq!(query.params().len(), 1);
    }

    #[test]
    fn test_filter_in() {
        let query = QueryBuilder::select(&[Column::Id]).filter_in(Column::ThumbnailReady, [0i64, 3]);
        assert_eq!(
            query.sql(),
            "SELECT id FROM assets WHERE thumbnail_ready IN (?1, ?2)"
        );

        let empty = QueryBuilder::select(&[Column::Id]).filter_in(Column::Id, Vec::<i64>::new());
        assert_eq!(empty.sql(), "SELECT id FROM assets WHERE 0");
    }

    #[test]
    fn test_multi_column_order() {
        let query = QueryBuilder::select(&[Column::Id, Column::Path])
            .order_by(Column::LcdVisitTime, true)
            .order_by(Column::Id, true)
            .limit(10);
        assert_eq!(
            query.sql(),
            "SELECT id, path FROM assets ORDER BY lcd_visit_time ASC, id ASC LIMIT ?1"
        );
        assert_eq!(query.params(), vec![Value::Integer(10)]);
    }
}

/// A named aggregation node. Groups form a DAG: a group's children are
/// meters and/or other groups, and a meter or group may belong to several
/// parents at once.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct Group {
    pub id: Option<i64>,
    pub name: String,
}

impl Group {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: None,
            name: name.into(),
        }
    }
}

// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Newtypes bridging Rust types to their SQL representations

use diesel::backend::Backend;
use diesel::deserialize::{self, FromSql};
use diesel::serialize::{self, IsNull, Output, ToSql};
use diesel::sql_types;
use diesel::sqlite::Sqlite;
use diesel::AsExpression;
use diesel::FromSqlRow;
use serde::Deserialize;
use serde::Serialize;
use std::fmt;
use uuid::Uuid;

/// A [`Uuid`] stored as its canonical hyphenated TEXT form
///
/// SQLite has no native uuid type, so primary and foreign keys round-trip
/// through TEXT.
#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    AsExpression,
    FromSqlRow,
    Serialize,
    Deserialize,
)]
#[diesel(sql_type = sql_types::Text)]
pub struct DbUuid(pub Uuid);

impl DbUuid {
    pub fn new_v4() -> Self {
        DbUuid(Uuid::new_v4())
    }
}

impl fmt::Display for DbUuid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<Uuid> for DbUuid {
    fn from(id: Uuid) -> Self {
        DbUuid(id)
    }
}

impl From<DbUuid> for Uuid {
    fn from(id: DbUuid) -> Self {
        id.0
    }
}

impl ToSql<sql_types::Text, Sqlite> for DbUuid {
    fn to_sql<'b>(
        &'b self,
        out: &mut Output<'b, '_, Sqlite>,
    ) -> serialize::Result {
        out.set_value(self.0.to_string());
        Ok(IsNull::No)
    }
}

impl FromSql<sql_types::Text, Sqlite> for DbUuid {
    fn from_sql(
        value: <Sqlite as Backend>::RawValue<'_>,
    ) -> deserialize::Result<Self> {
        let s = <String as FromSql<sql_types::Text, Sqlite>>::from_sql(value)?;
        Ok(DbUuid(Uuid::parse_str(&s)?))
    }
}

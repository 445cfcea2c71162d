//! Native type code to canonical type mapping.
//!
//! Each driver reports column types as numeric codes in its own namespace
//! (MySQL protocol field types, PostgreSQL OIDs). A `TypeMapper` reduces
//! them to `CanonicalType`. Unmapped codes become `CanonicalType::Unknown`.

use super::CanonicalType;

/// Maps a driver's native column-type codes to canonical types.
pub trait TypeMapper: Send + Sync {
    /// Maps one native code. Must be total.
    fn map(&self, native_code: u32) -> CanonicalType;
}

/// MySQL protocol field type codes.
pub mod mysql_codes {
    pub const DECIMAL: u32 = 0;
    pub const TINY: u32 = 1;
    pub const SHORT: u32 = 2;
    pub const LONG: u32 = 3;
    pub const FLOAT: u32 = 4;
    pub const DOUBLE: u32 = 5;
    pub const NULL: u32 = 6;
    pub const TIMESTAMP: u32 = 7;
    pub const LONGLONG: u32 = 8;
    pub const INT24: u32 = 9;
    pub const DATE: u32 = 10;
    pub const TIME: u32 = 11;
    pub const DATETIME: u32 = 12;
    pub const YEAR: u32 = 13;
    pub const VARCHAR: u32 = 15;
    pub const BIT: u32 = 16;
    pub const JSON: u32 = 245;
    pub const NEWDECIMAL: u32 = 246;
    pub const ENUM: u32 = 247;
    pub const SET: u32 = 248;
    pub const BLOB: u32 = 252;
    pub const VAR_STRING: u32 = 253;
    pub const STRING: u32 = 254;
    pub const GEOMETRY: u32 = 255;
}

/// Type mapper for MySQL / MariaDB.
#[derive(Debug, Clone, Copy, Default)]
pub struct MySqlTypeMapper;

impl TypeMapper for MySqlTypeMapper {
    fn map(&self, native_code: u32) -> CanonicalType {
        use mysql_codes::*;

        match native_code {
            DECIMAL | FLOAT | DOUBLE | NEWDECIMAL => CanonicalType::Float,
            TINY | SHORT | LONG | LONGLONG | INT24 | BIT => CanonicalType::Integer,
            TIMESTAMP | DATETIME => CanonicalType::Datetime,
            DATE => CanonicalType::Date,
            VARCHAR | VAR_STRING | STRING => CanonicalType::String,
            _ => CanonicalType::Unknown,
        }
    }
}

/// PostgreSQL type OIDs.
pub mod pg_oids {
    pub const BOOL: u32 = 16;
    pub const CHAR: u32 = 18;
    pub const NAME: u32 = 19;
    pub const INT8: u32 = 20;
    pub const INT2: u32 = 21;
    pub const INT4: u32 = 23;
    pub const TEXT: u32 = 25;
    pub const OID: u32 = 26;
    pub const FLOAT4: u32 = 700;
    pub const FLOAT8: u32 = 701;
    pub const MONEY: u32 = 790;
    pub const BPCHAR: u32 = 1042;
    pub const VARCHAR: u32 = 1043;
    pub const DATE: u32 = 1082;
    pub const TIMESTAMP: u32 = 1114;
    pub const TIMESTAMPTZ: u32 = 1184;
    pub const NUMERIC: u32 = 1700;
    pub const UUID: u32 = 2950;
}

/// Type mapper for PostgreSQL.
#[derive(Debug, Clone, Copy, Default)]
pub struct PgTypeMapper;

impl TypeMapper for PgTypeMapper {
    fn map(&self, native_code: u32) -> CanonicalType {
        use pg_oids::*;

        match native_code {
            BOOL => CanonicalType::Boolean,
            INT2 | INT4 | INT8 | OID => CanonicalType::Integer,
            FLOAT4 | FLOAT8 | NUMERIC | MONEY => CanonicalType::Float,
            DATE => CanonicalType::Date,
            TIMESTAMP | TIMESTAMPTZ => CanonicalType::Datetime,
            CHAR | NAME | TEXT | BPCHAR | VARCHAR | UUID => CanonicalType::String,
            _ => CanonicalType::Unknown,
        }
    }
}

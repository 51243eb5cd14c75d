//! Field limits and fixed values shared by validation and storage

/// Full name length bounds (characters)
pub const NAME_MIN_LENGTH: u64 = 2;
pub const NAME_MAX_LENGTH: u64 = 100;

pub const EMAIL_MAX_LENGTH: u64 = 255;
pub const PHONE_MAX_LENGTH: u64 = 20;
pub const JOB_TITLE_MAX_LENGTH: u64 = 100;
pub const MESSAGE_MAX_LENGTH: u64 = 2000;

/// Width of the `case_id` column
pub const CASE_ID_MAX_LENGTH: usize = 50;

/// Width of the `ip_address` column (fits IPv6 text form)
pub const IP_ADDRESS_MAX_LENGTH: usize = 45;

/// Earliest accepted date of birth, `(year, month, day)`
pub const DATE_OF_BIRTH_MIN: (i32, u32, u32) = (1900, 1, 1);

/// Earliest accepted diagnosis date, `(year, month, day)`
pub const DATE_OF_DIAGNOSIS_MIN: (i32, u32, u32) = (1950, 1, 1);

/// List query bounds
pub const DEFAULT_PAGE: u32 = 1;
pub const DEFAULT_PAGE_SIZE: u32 = 10;
pub const MAX_PAGE_SIZE: u32 = 100;
pub const SEARCH_MAX_LENGTH: usize = 100;

/// Prefix of every generated case identifier
pub const CASE_ID_PREFIX: &str = "CASE";

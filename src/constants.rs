//! Source site and column constants shared by the url builder, the normalizer and the CLI.

/// Disclosure search page; `{id}` and `{year}` are substituted per page.
pub const SOURCE_URL_TEMPLATE: &str = "https://h1bdata.info/index.php?em={id}&job=&city=&year={year}";

/// First year the source publishes disclosures for.
pub const START_YEAR: i32 = 2018;

/// Default request timeout for a single page fetch.
pub const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 30;

/// Object key prefix under the storage root.
pub const ARTIFACT_PREFIX: &str = "data";

// Column labels after label normalization
pub const COL_EMPLOYER: &str = "employer";
pub const COL_BASE_SALARY: &str = "base_salary";
pub const COL_LOCATION: &str = "location";
pub const COL_SUBMIT_DATE: &str = "submit_date";
pub const COL_START_DATE: &str = "start_date";
pub const COL_UNNAMED_STRAY: &str = "unnamed:_6";

// Derived columns
pub const COL_SUBMIT_YEAR: &str = "submit_year";
pub const COL_SUBMIT_MONTH: &str = "submit_month";
pub const COL_STATE: &str = "state";
pub const COL_CITY: &str = "city";
pub const COL_SCRAPED_EMPLOYER: &str = "scraped_employer";

/// Submission date format used by the source table.
pub const SUBMIT_DATE_FORMAT: &str = "%m/%d/%Y";

/// (display name, source identifier) pairs harvested when no config file overrides them.
pub const DEFAULT_EMPLOYERS: &[(&str, &str)] = &[
    ("apple", "apple+inc"),
    ("amazon", "amazon"),
    ("google", "google"),
    ("linkedin", "linkedin"),
    ("uber", "uber"),
    ("salesforce", "salesforce"),
];

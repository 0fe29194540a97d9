/// Error code registry for recipe-runner
///
/// Error codes are organized by category:
/// - 1000-1999: Configuration errors
/// - 2000-2999: Recipe validation errors
/// - 3000-3999: Compilation errors
/// - 4000-4999: Publication errors
/// - 5000-5999: Engine submission and execution errors
/// - 6000-6999: Dataset resolution errors
#[allow(dead_code)]
pub struct ErrorCode;

impl ErrorCode {
    // Configuration errors (1000-1999)
    pub const CONFIG_GENERIC: u16 = 1000;
    pub const CONFIG_NOT_FOUND: u16 = 1001;
    pub const CONFIG_INVALID_TOML: u16 = 1002;
    pub const CONFIG_INVALID_VALUE: u16 = 1003;

    // Recipe validation errors (2000-2999)
    pub const RECIPE_GENERIC: u16 = 2000;
    pub const RECIPE_DIR_NOT_FOUND: u16 = 2001;
    pub const RECIPE_FILE_NOT_FOUND: u16 = 2002;
    pub const RECIPE_INVALID_YAML: u16 = 2003;
    pub const RECIPE_INVALID_NAME: u16 = 2004;
    pub const RECIPE_EMPTY_INPUT: u16 = 2005;
    pub const RECIPE_INVALID_VALUE: u16 = 2006;
    pub const RECIPE_INVALID_JSON: u16 = 2007;
    pub const RECIPE_NO_COMMANDS: u16 = 2008;
    pub const RECIPE_UNSUPPORTED_OUTPUT: u16 = 2009;

    // Compilation errors (3000-3999)
    pub const COMPILE_UNSUPPORTED_INPUT: u16 = 3001;
    pub const COMPILE_EMPTY_PARTITION_INPUT: u16 = 3002;
    pub const COMPILE_DUPLICATE_FILENAME: u16 = 3003;

    // Publication errors (4000-4999)
    pub const PUBLISH_ALREADY_PUBLISHED: u16 = 4001;

    // Engine errors (5000-5999)
    pub const ENGINE_GENERIC: u16 = 5000;
    pub const ENGINE_SUBMISSION_FAILED: u16 = 5001;
    pub const ENGINE_NO_HANDLE: u16 = 5002;
    pub const ENGINE_EXECUTION_FAILED: u16 = 5003;
    pub const ENGINE_TIMEOUT: u16 = 5004;
    pub const ENGINE_MISSING_OUTPUT: u16 = 5005;
    pub const ENGINE_TRANSPORT: u16 = 5006;

    // Dataset resolution errors (6000-6999)
    pub const RESOLUTION_GENERIC: u16 = 6000;
    pub const RESOLUTION_NO_OBJECTS: u16 = 6001;
    pub const RESOLUTION_NO_MATCH: u16 = 6002;
    pub const RESOLUTION_UNRESOLVED: u16 = 6003;
    pub const RESOLUTION_REQUEST_FAILED: u16 = 6004;
}

/// Get a human-readable description for an error code
pub fn describe_error_code(code: u16) -> &'static str {
    match code {
        1000 => "Generic configuration error",
        1001 => "Configuration file not found",
        1002 => "Invalid TOML in configuration file",
        1003 => "Invalid configuration value",

        2000 => "Generic recipe error",
        2001 => "Recipe directory not found",
        2002 => "File referenced by recipe not found",
        2003 => "Invalid YAML in recipe configuration",
        2004 => "Recipe name contains invalid characters",
        2005 => "Recipe has no input parameters",
        2006 => "Invalid recipe value",
        2007 => "Invalid JSON in visualization config",
        2008 => "Shell file contains no commands",
        2009 => "Output type not supported for this workflow",

        3001 => "Unsupported input type",
        3002 => "No files to partition",
        3003 => "Two inputs share a file name",

        4001 => "Data already published",

        5000 => "Generic engine error",
        5001 => "Workflow submission failed",
        5002 => "Engine returned no workflow name",
        5003 => "Workflow execution failed",
        5004 => "Timed out waiting for workflow",
        5005 => "Workflow output missing",
        5006 => "Engine request failed",

        6000 => "Generic dataset resolution error",
        6001 => "Dataset contains no objects",
        6002 => "No dataset objects match filename pattern",
        6003 => "Dataset input has not been resolved",
        6004 => "Dataset resolution request failed",

        _ => "Unknown error code",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_ranges() {
        assert!(ErrorCode::CONFIG_GENERIC >= 1000 && ErrorCode::CONFIG_GENERIC < 2000);
        assert!(ErrorCode::RECIPE_GENERIC >= 2000 && ErrorCode::RECIPE_GENERIC < 3000);
        assert!(
            ErrorCode::COMPILE_UNSUPPORTED_INPUT >= 3000
                && ErrorCode::COMPILE_UNSUPPORTED_INPUT < 4000
        );
        assert!(ErrorCode::ENGINE_GENERIC >= 5000 && ErrorCode::ENGINE_GENERIC < 6000);
        assert!(ErrorCode::RESOLUTION_GENERIC >= 6000 && ErrorCode::RESOLUTION_GENERIC < 7000);
    }

    #[test]
    fn test_error_code_descriptions() {
        assert_eq!(describe_error_code(2002), "File referenced by recipe not found");
        assert_eq!(describe_error_code(4001), "Data already published");
        assert_eq!(describe_error_code(65535), "Unknown error code");
    }
}

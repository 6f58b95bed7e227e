// Central place for user-facing strings and reserved names.
// Keep these out of the managers to reduce duplication and make tweaks safer.

// Reserved bag keys (CPM_ prefix)
pub const CPM_PRIVATE_PREFIX: &str = "_";
pub const CPM_GROUP_DATA_KEY: &str = "_cpm_group_data";

// Environment variable overriding the preference log level.
pub const CPM_LOG_ENV: &str = "CPM_LOG";

// Data path roots understood by the reference document.
pub const PATH_SCENES: &str = "scenes";
pub const PATH_OBJECTS: &str = "objects";
pub const PATH_SCENE: &str = "scene";
pub const PATH_ACTIVE_OBJECT: &str = "active_object";

// Array properties are fixed-size on the host side.
pub const ARRAY_LENGTH_MIN: usize = 1;
pub const ARRAY_LENGTH_MAX: usize = 32;
pub const ARRAY_LENGTH_DEFAULT: usize = 3;

// Field defaults used when neither UI data nor the session has a value.
pub const DEFAULT_STEP_FLOAT: f64 = 0.1;
pub const DEFAULT_STEP_INT: i64 = 1;
pub const DEFAULT_PRECISION: i64 = 3;
pub const DEFAULT_SUBTYPE: &str = "NONE";

// English UI strings (EN_ prefix to make future localization easier)
pub const EN_LABEL_NAME: &str = "Property Name";
pub const EN_LABEL_GROUP: &str = "Group Name";
pub const EN_LABEL_TYPE: &str = "Type";
pub const EN_LABEL_SUBTYPE: &str = "Subtype";
pub const EN_LABEL_ARRAY_LENGTH: &str = "Array Length";
pub const EN_LABEL_DEFAULT: &str = "Default Value";
pub const EN_LABEL_MIN: &str = "Min";
pub const EN_LABEL_MAX: &str = "Max";
pub const EN_LABEL_USE_SOFT_LIMITS: &str = "Use Soft Limits";
pub const EN_LABEL_SOFT_MIN: &str = "Soft Min";
pub const EN_LABEL_SOFT_MAX: &str = "Soft Max";
pub const EN_LABEL_STEP: &str = "Step";
pub const EN_LABEL_PRECISION: &str = "Precision";
pub const EN_LABEL_DESCRIPTION: &str = "Description";
pub const EN_LABEL_OVERRIDABLE: &str = "Library Overridable";
pub const EN_LABEL_ID_TYPE: &str = "ID Type";
pub const EN_LABEL_PYTHON_VALUE: &str = "Value";

pub const EN_EMPTY: &str = "";
pub const EN_DESCRIPTION_PLACEHOLDER: &str = "Custom property";

pub const EN_ERR_GROUP_DATA_PARSE: &str = "Could not load group data from JSON string";
pub const EN_ERR_GROUP_DATA_WRITE: &str = "Could not store group data on data object";

// Scalar subtypes (name, label).
pub const SUBTYPES_SCALAR: &[(&str, &str)] = &[
    ("NONE", "Plain Data"),
    ("PIXEL", "Pixel"),
    ("PERCENTAGE", "Percentage"),
    ("FACTOR", "Factor"),
    ("ANGLE", "Angle"),
    ("TIME_ABSOLUTE", "Time"),
    ("DISTANCE", "Distance"),
    ("POWER", "Power"),
    ("TEMPERATURE", "Temperature"),
];

// Vector subtypes (name, label), used by array properties.
pub const SUBTYPES_VECTOR: &[(&str, &str)] = &[
    ("NONE", "Plain Data"),
    ("COLOR", "Linear Color"),
    ("COLOR_GAMMA", "Gamma-Corrected Color"),
    ("TRANSLATION", "Translation"),
    ("DIRECTION", "Direction"),
    ("VELOCITY", "Velocity"),
    ("ACCELERATION", "Acceleration"),
    ("EULER", "Euler Angles"),
    ("QUATERNION", "Quaternion Rotation"),
    ("AXISANGLE", "Axis-Angle"),
    ("XYZ", "XYZ"),
];

// Data-block kinds a DATA_BLOCK property may point at.
pub const ID_TYPES: &[&str] = &[
    "OBJECT",
    "MESH",
    "MATERIAL",
    "TEXTURE",
    "IMAGE",
    "SCENE",
    "COLLECTION",
    "CAMERA",
    "LIGHT",
    "NODETREE",
];
pub const ID_TYPE_DEFAULT: &str = "OBJECT";

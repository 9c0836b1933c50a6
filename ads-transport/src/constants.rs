//! ADS index groups and fixed record sizes

/// Acquire a symbol handle by name
pub const ADSIGRP_SYM_HNDBYNAME: u32 = 0xF003;
/// Read or write a symbol value by handle
pub const ADSIGRP_SYM_VALBYHND: u32 = 0xF005;
/// Release a symbol handle
pub const ADSIGRP_SYM_RELEASEHND: u32 = 0xF006;
/// Extended symbol information by name
pub const ADSIGRP_SYM_INFOBYNAMEEX: u32 = 0xF009;
/// Symbol table upload
pub const ADSIGRP_SYM_UPLOAD: u32 = 0xF00B;
/// Symbol table size information
pub const ADSIGRP_SYM_UPLOADINFO: u32 = 0xF00C;

/// Fixed header of a symbol entry record, before the name/type/comment strings
pub const SYMBOL_ENTRY_HEADER_SIZE: usize = 30;

/// Bytes requested for one extended symbol information record
pub const SYMBOL_INFO_READ_LENGTH: usize = SYMBOL_ENTRY_HEADER_SIZE + 3 * 256;

/// Size of the symbol upload information record
pub const SYMBOL_UPLOAD_INFO_LENGTH: usize = 8;

/// Offset of the sample data inside a notification record
pub const NOTIFICATION_DATA_OFFSET: usize = 16;

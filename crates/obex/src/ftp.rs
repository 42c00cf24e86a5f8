//! Folder browsing service constants.

use uuid::Uuid;

/// Folder browsing service UUID, F9EC7BC4-953C-11D2-984E-525400DC9E09.
pub const FTP_TARGET_UUID: Uuid = Uuid::from_u128(0xF9EC7BC4_953C_11D2_984E_525400DC9E09);

/// Folder browsing service UUID as carried in TARGET and WHO headers.
pub const FTP_TARGET: [u8; 16] = *FTP_TARGET_UUID.as_bytes();

/// Length of a TARGET header naming a service.
pub const UUID_LENGTH: usize = 16;

/// TYPE value requesting a folder listing.
pub const FOLDER_LISTING_TYPE: &str = "x-obex/folder-listing";

/// SINGLE_RESPONSE_MODE value enabling SRM.
pub const SRM_ENABLE: u8 = 0x01;

/// SINGLE_RESPONSE_MODE value disabling SRM.
pub const SRM_DISABLE: u8 = 0x00;

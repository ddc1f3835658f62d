mod services;

pub use services::{
    delete_profile_image, profile_image_url, sniff_mime, store_profile_image, UploadItem,
    PROFILE_IMAGE_MAX_KB, PROFILE_IMAGE_TYPES,
};

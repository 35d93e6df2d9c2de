pub mod alert;
pub mod analysis_result;
pub mod analyzed_video;
pub mod child_profile;
pub mod coppa_verification;
pub mod device_token;
pub mod linked_account;
pub mod notification_preferences;
pub mod parent_user;
pub mod subscribed_channel;

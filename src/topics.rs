//! Fixed topic namespace shared with the remote-control peer.

pub const DEVICES_CONFIG: &str = "mqtt_urc/config/devices";
pub const ACTIVITIES_CONFIG: &str = "mqtt_urc/config/activities";
pub const CURRENT_ACTIVITY: &str = "mqtt_urc/config/current_activity";
pub const CONFIG_REQUEST: &str = "mqtt_urc/config/request";
pub const ACTIVITY_CONTROL: &str = "mqtt_urc/activity";

/// Topics subscribed on every (re)connect.
pub const SUBSCRIPTIONS: [&str; 3] = [DEVICES_CONFIG, ACTIVITIES_CONFIG, CURRENT_ACTIVITY];

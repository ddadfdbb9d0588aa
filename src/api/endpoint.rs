pub type Endpoint = str;

pub const ACCESS_TOKEN: &Endpoint = "/prod-api/open/api/access_token";
pub const DEVICE_INFO: &Endpoint = "/prod-api/open/api/device/batInfo";
pub const PLANT_STATISTICS: &Endpoint = "/prod-api/open/api/plant/getPlantStatisticsData";
pub const HISTORY_DATA: &Endpoint = "/prod-api/open/api/device/historyDataCommon";
pub const REALTIME_DATA: &Endpoint = "/prod-api/open/api/device/realtimeDataCommon";
pub const LOAD_MONITORING: &Endpoint = "/prod-api/open/api/device/secData";

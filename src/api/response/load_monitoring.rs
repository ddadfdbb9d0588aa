use crate::model::{LoadMonitoring, RawSource};
use serde::Deserialize;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Module {
    pub module_sn: Option<String>,
    #[serde(default)]
    pub data: Vec<RawSource>,
    pub total: Option<RawSource>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecData {
    #[serde(default)]
    pub data_list: Vec<Module>,
}

impl SecData {
    /// Latest sample and totals of the first module that reported any samples.
    pub fn into_window(self) -> Option<LoadMonitoring> {
        self.data_list
            .into_iter()
            .find(|module| !module.data.is_empty())
            .and_then(|mut module| {
                module.data.pop().map(|latest| LoadMonitoring {
                    latest,
                    total: module.total.unwrap_or_default(),
                    module_sn: module.module_sn.unwrap_or_default(),
                })
            })
    }
}

//! Internationalization (i18n) module for calibration prompts and CLI output.

/// UI messages structure
#[derive(Debug, Clone)]
pub struct Messages {
    pub calibration_title: &'static str,
    pub physical_distance: &'static str,
    pub reference_length: &'static str,
    pub entered_length: &'static str,
    pub scale_factor: &'static str,
    pub calibration_saved: &'static str,
    pub calibration_not_saved: &'static str,
    pub calibration_cancelled: &'static str,
    pub not_calibrated: &'static str,
    pub no_calibrations: &'static str,
    pub cleared: &'static str,
    pub cancel_hint: &'static str,
}

/// Chinese messages
pub static MESSAGES_ZH: Messages = Messages {
    calibration_title: "校准",
    physical_distance: "实际物理距离",
    reference_length: "参考线长度",
    entered_length: "输入长度",
    scale_factor: "比例系数",
    calibration_saved: "校准已保存",
    calibration_not_saved: "校准未能保存，仅对当前视图生效",
    calibration_cancelled: "校准已取消",
    not_calibrated: "未校准",
    no_calibrations: "暂无校准记录",
    cleared: "已清除",
    cancel_hint: "直接回车取消",
};

/// English messages
pub static MESSAGES_EN: Messages = Messages {
    calibration_title: "Calibration",
    physical_distance: "Actual Physical distance",
    reference_length: "Reference length",
    entered_length: "Entered length",
    scale_factor: "Scale factor",
    calibration_saved: "Calibration saved",
    calibration_not_saved: "Calibration was not persisted; it applies to the current view only",
    calibration_cancelled: "Calibration cancelled",
    not_calibrated: "not calibrated",
    no_calibrations: "No calibrations stored",
    cleared: "Cleared",
    cancel_hint: "press Enter on an empty line to cancel",
};

/// Get UI messages by language.
///
/// # Arguments
/// * `lang` - Language code, "cn" for Chinese, "en" for English.
pub fn get_messages(lang: &str) -> &'static Messages {
    match lang {
        "cn" => &MESSAGES_ZH,
        _ => &MESSAGES_EN,
    }
}

/// Dialog placeholder naming the physical unit, e.g. `Actual Physical distance (mm)`.
pub fn distance_placeholder(lang: &str, unit: &str) -> String {
    format!("{} ({})", get_messages(lang).physical_distance, unit)
}

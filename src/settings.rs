//! The viewer's persisted settings.

use serde::{Deserialize, Serialize};

/// The key settings are stored under, see [`ns`](`crate::ns`).
pub const SETTINGS_KEY: &str = "_tmv_settings";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThumbnailFit {
	Contain,
	Cover,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FastForwardActivation {
	Hold,
	Toggle,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EndTimeFormat {
	Total,
	Remaining,
}

fn key(shortcut: &str) -> Option<String> {
	Some(shortcut.to_owned())
}

crate::synced_record! {
	/// Everything the UI persists. Shortcut fields hold [`key_event_id`](`crate::input::key_event_id`)s, or [`None`] if unbound.
	pub struct Settings, pub trait SettingsFields {
		/// Drives the "what's new" indication.
		last_acknowledged_version / set_last_acknowledged_version: String = "2.7.0".to_owned(),

		media_list_width / set_media_list_width: f64 = 640.0,
		/// Fraction of the viewport.
		media_list_height / set_media_list_height: f64 = 0.5,
		media_list_items_per_row / set_media_list_items_per_row: u32 = 3,
		thumbnail_fit / set_thumbnail_fit: ThumbnailFit = ThumbnailFit::Contain,

		/// 0 to 1.
		volume / set_volume: f64 = 0.5,
		fast_forward_activation / set_fast_forward_activation: FastForwardActivation = FastForwardActivation::Hold,
		fast_forward_rate / set_fast_forward_rate: f64 = 5.0,
		adjust_volume_by / set_adjust_volume_by: f64 = 0.125,
		adjust_speed_by / set_adjust_speed_by: f64 = 0.5,
		/// Seconds.
		seek_by / set_seek_by: f64 = 5.0,
		/// Seconds.
		tiny_seek_by / set_tiny_seek_by: f64 = 0.033,
		end_time_format / set_end_time_format: EndTimeFormat = EndTimeFormat::Total,

		fpm_video_upscale_threshold / set_fpm_video_upscale_threshold: f64 = 0.5,
		fpm_video_upscale_limit / set_fpm_video_upscale_limit: f64 = 2.0,
		fpm_image_upscale_threshold / set_fpm_image_upscale_threshold: f64 = 0.0,
		fpm_image_upscale_limit / set_fpm_image_upscale_limit: f64 = 2.0,

		catalog_navigator / set_catalog_navigator: bool = true,
		/// Milliseconds.
		hold_time_threshold / set_hold_time_threshold: u32 = 200,

		#[serde(rename = "keyToggleUI")]
		key_toggle_ui / set_key_toggle_ui: Option<String> = key("`"),
		key_nav_left / set_key_nav_left: Option<String> = key("a"),
		key_nav_right / set_key_nav_right: Option<String> = key("d"),
		key_nav_up / set_key_nav_up: Option<String> = key("w"),
		key_nav_down / set_key_nav_down: Option<String> = key("s"),
		key_nav_page_back / set_key_nav_page_back: Option<String> = key("PageUp"),
		key_nav_page_forward / set_key_nav_page_forward: Option<String> = key("PageDown"),
		key_nav_start / set_key_nav_start: Option<String> = key("Home"),
		key_nav_end / set_key_nav_end: Option<String> = key("End"),

		key_list_view_toggle / set_key_list_view_toggle: Option<String> = key("f"),
		key_list_view_left / set_key_list_view_left: Option<String> = key("A"),
		key_list_view_right / set_key_list_view_right: Option<String> = key("D"),
		key_list_view_up / set_key_list_view_up: Option<String> = key("W"),
		key_list_view_down / set_key_list_view_down: Option<String> = key("S"),

		key_view_close / set_key_view_close: Option<String> = key("F"),
		key_view_full_page / set_key_view_full_page: Option<String> = key("Tab"),
		key_view_pause / set_key_view_pause: Option<String> = key("Space"),
		key_view_fast_forward / set_key_view_fast_forward: Option<String> = key("Shift+Space"),
		key_view_volume_down / set_key_view_volume_down: Option<String> = key("Q"),
		key_view_volume_up / set_key_view_volume_up: Option<String> = key("E"),
		key_view_speed_down / set_key_view_speed_down: Option<String> = key("Alt+q"),
		key_view_speed_up / set_key_view_speed_up: Option<String> = key("Alt+e"),
		key_view_speed_reset / set_key_view_speed_reset: Option<String> = key("Alt+w"),
		key_view_seek_back / set_key_view_seek_back: Option<String> = key("q"),
		key_view_seek_forward / set_key_view_seek_forward: Option<String> = key("e"),
		key_view_tiny_seek_back / set_key_view_tiny_seek_back: Option<String> = key("Alt+a"),
		key_view_tiny_seek_forward / set_key_view_tiny_seek_forward: Option<String> = key("Alt+d"),
		key_view_seek_to_0 / set_key_view_seek_to_0: Option<String> = key("0"),
		key_view_seek_to_10 / set_key_view_seek_to_10: Option<String> = key("1"),
		key_view_seek_to_20 / set_key_view_seek_to_20: Option<String> = key("2"),
		key_view_seek_to_30 / set_key_view_seek_to_30: Option<String> = key("3"),
		key_view_seek_to_40 / set_key_view_seek_to_40: Option<String> = key("4"),
		key_view_seek_to_50 / set_key_view_seek_to_50: Option<String> = key("5"),
		key_view_seek_to_60 / set_key_view_seek_to_60: Option<String> = key("6"),
		key_view_seek_to_70 / set_key_view_seek_to_70: Option<String> = key("7"),
		key_view_seek_to_80 / set_key_view_seek_to_80: Option<String> = key("8"),
		key_view_seek_to_90 / set_key_view_seek_to_90: Option<String> = key("9"),

		key_catalog_open_thread / set_key_catalog_open_thread: String = "f".to_owned(),
		key_catalog_open_thread_in_new_tab / set_key_catalog_open_thread_in_new_tab: String = "Ctrl+F".to_owned(),
		key_catalog_open_thread_in_background_tab / set_key_catalog_open_thread_in_background_tab: String = "F".to_owned(),
	}
}

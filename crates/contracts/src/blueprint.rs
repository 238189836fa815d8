//! SessionBlueprint - Config Loader 输出
//!
//! 描述一次采集会话的完整配置：设备、视频流、注视流、同步策略、输出路由。

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use validator::Validate;

use crate::{GazeConfig, SyncEngineConfig, VideoStreamConfig};

/// 配置版本
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ConfigVersion {
    #[default]
    V1,
}

/// 完整的会话配置蓝图
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct SessionBlueprint {
    /// 配置版本
    #[serde(default)]
    pub version: ConfigVersion,

    /// 镜像设备
    #[serde(default)]
    #[validate(nested)]
    pub device: DeviceConfig,

    /// 视频流参数
    #[serde(default)]
    #[validate(nested)]
    pub video: VideoStreamConfig,

    /// 注视流参数
    #[serde(default)]
    #[validate(nested)]
    pub gaze: GazeConfig,

    /// 同步策略配置
    #[serde(default)]
    #[validate(nested)]
    pub sync: SyncEngineConfig,

    /// 输出路由配置
    #[serde(default)]
    pub sinks: Vec<SinkConfig>,
}

/// 设备配置：adb 服务地址、设备选择、服务端 jar
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct DeviceConfig {
    /// 设备序列号 (优先于 device_index)
    #[serde(default)]
    pub serial: Option<String>,

    /// `adb devices` 列表中的下标
    #[serde(default)]
    pub device_index: Option<usize>,

    /// adb server 地址
    #[serde(default = "default_adb_host")]
    #[validate(length(min = 1))]
    pub adb_host: String,

    /// adb server 端口
    #[serde(default = "default_adb_port")]
    pub adb_port: u16,

    /// 本地 scrcpy-server.jar 路径
    #[serde(default = "default_server_jar")]
    pub server_jar: PathBuf,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            serial: None,
            device_index: None,
            adb_host: default_adb_host(),
            adb_port: default_adb_port(),
            server_jar: default_server_jar(),
        }
    }
}

fn default_adb_host() -> String {
    "127.0.0.1".to_string()
}

fn default_adb_port() -> u16 {
    5037
}

fn default_server_jar() -> PathBuf {
    PathBuf::from("3rdparty/scrcpy/scrcpy-server.jar")
}

/// Sink 输出配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SinkConfig {
    /// Sink 名称
    pub name: String,

    /// Sink 类型
    pub sink_type: SinkType,

    /// 队列容量
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    /// 类型特定参数
    #[serde(default)]
    pub params: HashMap<String, String>,
}

fn default_queue_capacity() -> usize {
    100
}

/// Sink 类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SinkType {
    /// 日志输出
    Log,
    /// 文件输出 (JSONL + 可选帧图像)
    File,
}

//! # configuration 模块说明
//!
//! ## 角色定位（Why）
//! - 保存 Promise 调度库的进程级配置：是否允许回退到当前线程、执行器、两类回调；
//! - 读取极其频繁而更新罕见，因此读路径是一次原子加载，写路径采用“复制、合并、比较交换”。
//!
//! ## 结构概览（How）
//! - [`ConfigurationSnapshot`]：不可变的完整取值集合，惰性字段在首次读取时物化；
//! - [`ConfigurationCell`]：持有当前快照的原子单元，提供读取与比较交换；
//! - [`SettingsUpdate`]：更新闭包面对的可写视图，逐字段记录是否被显式写入；
//! - [`UpdateCoordinator`]：驱动“基准读取 → 执行闭包 → 合并 → 比较交换重试”的完整流程。
//!
//! ## 契约说明（What）
//! - 读者永远观察到完整快照，不会看到部分更新；
//! - 更新只覆盖显式写入的字段，并发更新写入的其余字段得以保留；
//! - 快照纪元严格递增，可用于确认某次读取是否晚于某次提交。

mod cell;
mod field;
mod settings;
mod snapshot;
mod update;

pub use cell::ConfigurationCell;
pub use field::{Field, FieldSet};
pub use settings::{Settings, SettingsMut};
pub use snapshot::ConfigurationSnapshot;
pub use update::{SettingsUpdate, UpdateCoordinator, UpdateOutcome};

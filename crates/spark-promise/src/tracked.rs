//! 单次更新块内的“写入追踪”字段。
//!
//! # 设计背景（Why）
//! - 更新闭包对每个字段都同时拥有读写能力，仅靠最终值无法区分“用户改了它”与“用户只是读了它”；
//! - 若把读取也当作覆盖，更新会把当时读到的旧值写回，从而吞掉其他线程在此期间的修改，
//!   同时迫使所有惰性默认值在配置阶段被物化。
//!
//! # 契约说明（What）
//! - `get`：已赋值时返回赋值结果，否则惰性调用继承值供应函数并缓存结果，**不会**标记写入；
//! - `set`：保存新值并标记写入，重复调用保持已写入状态；
//! - `was_written`：报告本次更新块内是否发生过 `set`。
//!
//! # 注意事项（Trade-offs）
//! - 追踪字段只在单个更新调用内存活，由持有它的线程独占，因此缓存使用 [`OnceCell`] 而非原子原语。

use std::cell::OnceCell;
use std::convert::Infallible;
use std::fmt;

type Supplier<T, E> = Box<dyn Fn() -> Result<T, E>>;

/// 记录“是否被显式写入”的可覆盖字段。
pub struct TrackedCell<T, E = Infallible> {
    inherited: Supplier<T, E>,
    cached: OnceCell<T>,
    assigned: Option<T>,
}

impl<T, E> TrackedCell<T, E> {
    /// 以继承值供应函数构造追踪字段。
    pub fn new<F>(inherited: F) -> Self
    where
        F: Fn() -> Result<T, E> + 'static,
    {
        Self {
            inherited: Box::new(inherited),
            cached: OnceCell::new(),
            assigned: None,
        }
    }

    /// 返回当前可见的值：优先返回显式赋值，否则返回继承值。
    ///
    /// - **前置条件**：无；继承值仅在首次需要时计算；
    /// - **后置条件**：[`Self::was_written`] 不受影响；供应函数失败时错误原样返回，下一次读取会重新尝试。
    pub fn get(&self) -> Result<T, E>
    where
        T: Clone,
    {
        if let Some(value) = &self.assigned {
            return Ok(value.clone());
        }
        if let Some(value) = self.cached.get() {
            return Ok(value.clone());
        }
        let value = (self.inherited)()?;
        Ok(self.cached.get_or_init(|| value).clone())
    }

    /// 显式赋值并标记写入。
    pub fn set(&mut self, value: T) {
        self.assigned = Some(value);
    }

    /// 本次更新块内是否发生过写入。
    pub fn was_written(&self) -> bool {
        self.assigned.is_some()
    }

    /// 仅当发生过写入时返回写入的值，供合并阶段使用。
    pub fn written(&self) -> Option<&T> {
        self.assigned.as_ref()
    }
}

impl<T: fmt::Debug, E> fmt::Debug for TrackedCell<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TrackedCell")
            .field("assigned", &self.assigned)
            .field("inherited", &self.cached.get())
            .finish()
    }
}

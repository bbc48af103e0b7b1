//! 线程安全的“首次读取时赋值”容器。
//!
//! # 设计背景（Why）
//! - 默认执行器是一个线程池，创建成本高且带有外部可见的副作用；只有在确实被读取时才应创建；
//! - 多个线程可能同时触发首次读取，必须保证所有线程最终观察到同一个值。
//!
//! # 逻辑解析（How）
//! - 初始化函数在锁外执行，允许多个线程重复计算；
//! - 计算结果通过 [`OnceLock`](std::sync::OnceLock) 竞争安装，第一个成功安装者胜出，其余线程丢弃各自的结果并返回已安装值；
//! - 初始化失败时直接把错误交给调用方，容器保持未初始化，后续访问可再次尝试。
//!
//! # 契约说明（What）
//! - 读取路径在初始化完成后仅为一次原子加载，不会阻塞；
//! - 重复计算只浪费资源，不影响正确性：被丢弃的值在返回前即被 drop。

use std::convert::Infallible;
use std::fmt;

use crate::sync::InstallSlot;

type Initializer<T, E> = Box<dyn Fn() -> Result<T, E> + Send + Sync>;

/// 惰性、只安装一次的共享值。
///
/// # 教案式说明
/// - **意图 (Why)**：替代“委托属性”式的惰性字段，以显式泛型包装提供 `get` 语义；
/// - **契约 (What)**：
///   - `get` 首次调用时执行初始化函数，返回值为首个成功安装的结果；
///   - `E` 默认为 [`Infallible`]，此时可使用 [`LazyCell::force`] 省去错误处理；
/// - **风险 (Trade-offs)**：并发首读时初始化函数可能执行多次，调用方不得在初始化函数中假设“恰好一次”。
pub struct LazyCell<T, E = Infallible> {
    value: InstallSlot<T>,
    init: Initializer<T, E>,
}

impl<T, E> LazyCell<T, E> {
    /// 以初始化函数构造未初始化的容器。
    pub fn new<F>(init: F) -> Self
    where
        F: Fn() -> Result<T, E> + Send + Sync + 'static,
    {
        Self {
            value: InstallSlot::new(),
            init: Box::new(init),
        }
    }

    /// 是否已经安装了值。
    pub fn is_initialized(&self) -> bool {
        self.value.is_set()
    }

    /// 在不触发初始化的前提下取得已安装值的克隆。
    pub fn peek(&self) -> Option<T>
    where
        T: Clone,
    {
        self.value.get()
    }

    /// 返回已安装的值，必要时执行初始化函数。
    ///
    /// # 契约说明（What）
    /// - **返回值**：首个成功安装的值的克隆；初始化失败时返回该次初始化的错误；
    /// - **后置条件**：返回 `Ok` 后 [`Self::is_initialized`] 恒为 `true`，且此后所有调用返回同一个值。
    ///
    /// # 执行逻辑（How）
    /// 1. 快路径：已安装则直接克隆返回；
    /// 2. 慢路径：在锁外执行初始化函数得到候选值；
    /// 3. 竞争安装候选值，若他人已抢先安装，候选值被丢弃。
    pub fn get(&self) -> Result<T, E>
    where
        T: Clone,
    {
        if let Some(value) = self.value.get() {
            return Ok(value);
        }

        let candidate = (self.init)()?;
        let (installed, installed_here) = self.value.install(candidate);
        if !installed_here {
            tracing::debug!("惰性值已被其他线程抢先安装，丢弃本线程的冗余结果");
        }
        Ok(installed)
    }
}

impl<T: Clone> LazyCell<T, Infallible> {
    /// 对不可失败的初始化函数直接返回值。
    pub fn force(&self) -> T {
        match self.get() {
            Ok(value) => value,
            Err(never) => match never {},
        }
    }
}

impl<T: Clone + fmt::Debug, E> fmt::Debug for LazyCell<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.value.get() {
            Some(value) => f.debug_tuple("LazyCell").field(&value).finish(),
            None => f.write_str("LazyCell(<uninit>)"),
        }
    }
}

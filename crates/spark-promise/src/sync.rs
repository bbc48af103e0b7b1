//! 同步原语切换层。
//!
//! 教案级说明：常规构建中惰性安装基于 [`std::sync::OnceLock`]，快照单元基于 `ArcSwap`；
//! 二者都不经过 Loom 的调度器。启用 `--cfg loom`（或 `--cfg spark_loom`，需同时开启 `loom-model` feature）时
//! 切换到 `loom::sync::Mutex` 实现，使模型检查能够直接驱动 [`LazyCell`](crate::LazyCell) 与
//! [`UpdateCoordinator`](crate::UpdateCoordinator) 的真实代码路径。两套实现对外暴露相同的方法集合。

pub(crate) use imp::{InstallSlot, SwapSlot};

#[cfg(not(any(loom, spark_loom)))]
mod imp {
    use std::sync::{Arc, OnceLock};

    use arc_swap::ArcSwap;

    /// 只能成功安装一次的槽位。
    pub(crate) struct InstallSlot<T> {
        value: OnceLock<T>,
    }

    impl<T> InstallSlot<T> {
        pub(crate) fn new() -> Self {
            Self {
                value: OnceLock::new(),
            }
        }

        pub(crate) fn is_set(&self) -> bool {
            self.value.get().is_some()
        }

        pub(crate) fn get(&self) -> Option<T>
        where
            T: Clone,
        {
            self.value.get().cloned()
        }

        /// 竞争安装 `candidate`，返回最终安装的值以及本次调用是否胜出。
        pub(crate) fn install(&self, candidate: T) -> (T, bool)
        where
            T: Clone,
        {
            let mut installed_here = false;
            let installed = self.value.get_or_init(|| {
                installed_here = true;
                candidate
            });
            (installed.clone(), installed_here)
        }
    }

    /// 以指针身份做比较交换的共享快照槽位。
    pub(crate) struct SwapSlot<T> {
        current: ArcSwap<T>,
    }

    impl<T> SwapSlot<T> {
        pub(crate) fn new(initial: T) -> Self {
            Self {
                current: ArcSwap::from_pointee(initial),
            }
        }

        pub(crate) fn load_full(&self) -> Arc<T> {
            self.current.load_full()
        }

        pub(crate) fn compare_and_swap(&self, expected: &Arc<T>, new: Arc<T>) -> bool {
            let previous = self.current.compare_and_swap(expected, new);
            Arc::ptr_eq(&*previous, expected)
        }
    }
}

#[cfg(any(loom, spark_loom))]
mod imp {
    use std::sync::{Arc, PoisonError};

    use loom::sync::Mutex;

    pub(crate) struct InstallSlot<T> {
        value: Mutex<Option<T>>,
    }

    impl<T> InstallSlot<T> {
        pub(crate) fn new() -> Self {
            Self {
                value: Mutex::new(None),
            }
        }

        pub(crate) fn is_set(&self) -> bool {
            self.value
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .is_some()
        }

        pub(crate) fn get(&self) -> Option<T>
        where
            T: Clone,
        {
            self.value
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .clone()
        }

        pub(crate) fn install(&self, candidate: T) -> (T, bool)
        where
            T: Clone,
        {
            let mut slot = self.value.lock().unwrap_or_else(PoisonError::into_inner);
            match slot.as_ref() {
                Some(installed) => (installed.clone(), false),
                None => {
                    *slot = Some(candidate.clone());
                    (candidate, true)
                }
            }
        }
    }

    pub(crate) struct SwapSlot<T> {
        current: Mutex<Arc<T>>,
    }

    impl<T> SwapSlot<T> {
        pub(crate) fn new(initial: T) -> Self {
            Self {
                current: Mutex::new(Arc::new(initial)),
            }
        }

        pub(crate) fn load_full(&self) -> Arc<T> {
            Arc::clone(&self.current.lock().unwrap_or_else(PoisonError::into_inner))
        }

        pub(crate) fn compare_and_swap(&self, expected: &Arc<T>, new: Arc<T>) -> bool {
            let mut current = self.current.lock().unwrap_or_else(PoisonError::into_inner);
            if Arc::ptr_eq(&current, expected) {
                *current = new;
                true
            } else {
                false
            }
        }
    }
}

//! 配置更新的模型性质验证。
//!
//! # 教案级注释概览
//!
//! - **核心目标 (Why)**：`configure` 的合并语义可以用一个极简的影子模型描述：每个字段保存“最后一次显式写入的值”，
//!   未写入的字段保持原值。随机生成更新序列并与模型逐步比较，可以覆盖手写用例难以穷举的组合；
//! - **设计手法 (How)**：
//!   - `Write` 描述闭包内的单个动作，`Read` 只读取字段，不应改变任何东西；
//!   - 回调取值用预先构造的处理器池的下标表示，断言时通过 `ptr_eq` 比对身份；
//!   - 嵌套更新（在闭包内部触发另一次提交）模拟“基准已过期”的交错，其合并结果同样必须符合模型。
//!
//! # 合同与边界 (What)
//!
//! - 性质 1：顺序应用任意更新序列后，快照各字段等于模型中的取值，纪元等于提交次数；
//! - 性质 2：`UpdateOutcome::written` 恰好是闭包中被写入的字段集合，读取不计入；
//! - 性质 3：嵌套提交与外层提交都写入时，外层（后提交者）胜出；只被嵌套提交写入的字段得以保留。

use std::sync::Arc;

use proptest::prelude::*;
use spark_promise::test_stubs::InlineExecutor;
use spark_promise::{
    ConfigurationCell, ExecutionErrorHandler, Field, FieldSet, MultipleCompletionHandler,
    Settings, SettingsMut, SettingsUpdate, SharedExecutor,
};

const POOL: usize = 4;

/// 闭包内的单个动作。
#[derive(Clone, Copy, Debug)]
enum Write {
    Fallback(bool),
    ExecutionErrors(usize),
    MultipleCompletion(usize),
    Read,
}

fn write_strategy() -> impl Strategy<Value = Write> {
    prop_oneof![
        any::<bool>().prop_map(Write::Fallback),
        (0..POOL).prop_map(Write::ExecutionErrors),
        (0..POOL).prop_map(Write::MultipleCompletion),
        Just(Write::Read),
    ]
}

fn update_strategy() -> impl Strategy<Value = Vec<Write>> {
    prop::collection::vec(write_strategy(), 0..5)
}

/// 影子模型：`None` 表示字段仍为默认值。
#[derive(Clone, Debug, Default)]
struct Model {
    fallback: Option<bool>,
    execution_errors: Option<usize>,
    multiple_completion: Option<usize>,
}

impl Model {
    fn apply(&mut self, writes: &[Write]) {
        for write in writes {
            match *write {
                Write::Fallback(value) => self.fallback = Some(value),
                Write::ExecutionErrors(index) => self.execution_errors = Some(index),
                Write::MultipleCompletion(index) => self.multiple_completion = Some(index),
                Write::Read => {}
            }
        }
    }
}

struct Handlers {
    errors: Vec<ExecutionErrorHandler>,
    completions: Vec<MultipleCompletionHandler>,
}

impl Handlers {
    fn new() -> Self {
        Self {
            errors: (0..POOL).map(|_| ExecutionErrorHandler::new(|_| {})).collect(),
            completions: (0..POOL)
                .map(|_| MultipleCompletionHandler::new(|_, _| {}))
                .collect(),
        }
    }

    fn perform(&self, view: &mut SettingsUpdate, writes: &[Write]) {
        for write in writes {
            match *write {
                Write::Fallback(value) => view.set_fallback_on_current_thread(value),
                Write::ExecutionErrors(index) => {
                    view.set_execution_errors(self.errors[index].clone())
                }
                Write::MultipleCompletion(index) => {
                    view.set_multiple_completion(self.completions[index].clone())
                }
                Write::Read => {
                    let _ = view.fallback_on_current_thread();
                    let _ = view.execution_errors();
                    let _ = view.multiple_completion();
                }
            }
        }
    }

    fn assert_matches(&self, cell: &ConfigurationCell, model: &Model) {
        let snapshot = cell.current();
        assert_eq!(
            snapshot.fallback_on_current_thread(),
            model.fallback.unwrap_or(true)
        );
        match model.execution_errors {
            Some(index) => assert!(snapshot.execution_errors().ptr_eq(&self.errors[index])),
            None => assert!(
                self.errors
                    .iter()
                    .all(|handler| !snapshot.execution_errors().ptr_eq(handler)),
                "未写入时必须保持默认处理器"
            ),
        }
        match model.multiple_completion {
            Some(index) => {
                assert!(snapshot.multiple_completion().ptr_eq(&self.completions[index]))
            }
            None => assert!(
                self.completions
                    .iter()
                    .all(|handler| !snapshot.multiple_completion().ptr_eq(handler)),
                "未写入时必须保持默认处理器"
            ),
        }
    }
}

fn expected_written(writes: &[Write]) -> FieldSet {
    writes
        .iter()
        .filter_map(|write| match write {
            Write::Fallback(_) => Some(Field::FallbackOnCurrentThread),
            Write::ExecutionErrors(_) => Some(Field::ExecutionErrors),
            Write::MultipleCompletion(_) => Some(Field::MultipleCompletion),
            Write::Read => None,
        })
        .collect()
}

fn inline_cell() -> ConfigurationCell {
    ConfigurationCell::with_executor_factory(|| Ok(Arc::new(InlineExecutor) as SharedExecutor))
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    #[test]
    fn sequential_updates_follow_last_write_model(
        updates in prop::collection::vec(update_strategy(), 0..12)
    ) {
        let cell = inline_cell();
        let handlers = Handlers::new();
        let mut model = Model::default();

        for writes in &updates {
            let outcome = cell.configure(|view| handlers.perform(view, writes));
            model.apply(writes);
            prop_assert_eq!(outcome.written(), expected_written(writes));
            prop_assert_eq!(outcome.attempts(), 1, "单线程更新不应发生比较交换失败");
            handlers.assert_matches(&cell, &model);
        }
        prop_assert_eq!(cell.current().epoch(), updates.len() as u64);
    }

    #[test]
    fn nested_commit_is_merged_under_outer_writes(
        outer in update_strategy(),
        inner in update_strategy(),
    ) {
        let cell = inline_cell();
        let handlers = Handlers::new();

        cell.configure(|view| {
            cell.configure(|nested| handlers.perform(nested, &inner));
            handlers.perform(view, &outer);
        });

        let mut model = Model::default();
        model.apply(&inner);
        model.apply(&outer);
        handlers.assert_matches(&cell, &model);
        prop_assert_eq!(cell.current().epoch(), 2);
    }
}

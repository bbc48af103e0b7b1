use core::fmt;

/// 配置快照中的五个字段。
///
/// - 分发执行器与工作执行器目前指向同一个底层资源，但仍以两个字段出现，为将来拆分保留空间。
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Field {
    FallbackOnCurrentThread,
    DispatchExecutor,
    WorkExecutor,
    ExecutionErrors,
    MultipleCompletion,
}

impl Field {
    pub const ALL: [Field; 5] = [
        Field::FallbackOnCurrentThread,
        Field::DispatchExecutor,
        Field::WorkExecutor,
        Field::ExecutionErrors,
        Field::MultipleCompletion,
    ];

    /// 稳定的字段名，用于日志与调试输出。
    pub const fn name(self) -> &'static str {
        match self {
            Field::FallbackOnCurrentThread => "fallback_on_current_thread",
            Field::DispatchExecutor => "dispatch_executor",
            Field::WorkExecutor => "work_executor",
            Field::ExecutionErrors => "execution_errors",
            Field::MultipleCompletion => "multiple_completion",
        }
    }

    const fn bit(self) -> u8 {
        1 << (self as u8)
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// 字段集合，记录一次更新中被显式写入的字段。
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct FieldSet(u8);

impl FieldSet {
    pub const EMPTY: FieldSet = FieldSet(0);

    pub fn insert(&mut self, field: Field) {
        self.0 |= field.bit();
    }

    pub const fn contains(self, field: Field) -> bool {
        self.0 & field.bit() != 0
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub const fn len(self) -> usize {
        self.0.count_ones() as usize
    }

    /// 按声明顺序遍历集合内的字段。
    pub fn iter(self) -> impl Iterator<Item = Field> {
        Field::ALL
            .into_iter()
            .filter(move |field| self.contains(*field))
    }
}

impl FromIterator<Field> for FieldSet {
    fn from_iter<I: IntoIterator<Item = Field>>(iter: I) -> Self {
        let mut set = FieldSet::EMPTY;
        for field in iter {
            set.insert(field);
        }
        set
    }
}

impl fmt::Debug for FieldSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter().map(Field::name)).finish()
    }
}

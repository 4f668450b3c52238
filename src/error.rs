use thiserror::Error;

/// 索引构建、读写与批量比对的错误类型。
///
/// "未找到" 不是错误：检索与比对失败统一用 `None` 表示。
#[derive(Debug, Error)]
pub enum Error {
    /// 文件打不开、读写失败
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// 索引元数据（`.meta` 附属文件）编解码失败
    #[error("index metadata error: {0}")]
    Meta(#[from] bincode::Error),

    /// 索引文件内容与其头部声明不一致（截断、负数、计数不符）
    #[error("index format error: {0}")]
    Format(String),

    /// 序列超出 32 位索引格式可表示的范围
    #[error("sequence of {len} bases exceeds the index limit of {limit}")]
    TooLarge { len: usize, limit: usize },

    /// rank 分块大小必须为 16 的正整数倍
    #[error("rank block size {0} must be a positive multiple of 16")]
    InvalidBlockSize(usize),

    /// 桶排序深度超限；调用方应改用线性时间算法重试
    #[error("suffix sort exceeded depth limit {limit}; retry with the linear-time builder")]
    SortDepthExceeded { limit: usize },

    /// 批量任务被取消
    #[error("batch cancelled")]
    Cancelled,

    #[error("invalid input: {0}")]
    InvalidInput(String),
}

pub type Result<T> = std::result::Result<T, Error>;

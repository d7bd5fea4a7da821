#[derive(Debug, PartialEq, Eq)]
pub enum BftDsnCLIError {
    ShardFileUnreadable(String),
    ShardFileLengthMismatch(usize, usize),
}

impl std::fmt::Display for BftDsnCLIError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BftDsnCLIError::ShardFileUnreadable(err) => write!(f, "{}", err),
            BftDsnCLIError::ShardFileLengthMismatch(got, expected) => {
                write!(f, "shard file is {}B long, expected {}B", got, expected)
            }
        }
    }
}

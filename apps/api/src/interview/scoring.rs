/// Final score: `floor((question_count - mistakes) / question_count * 100)`,
/// clamped to `[0, 100]`. More mistakes than questions scores 0.
pub fn compute_score(question_count: u32, mistake_count: usize) -> u8 {
    if question_count == 0 {
        return 0;
    }
    let total = u64::from(question_count);
    let mistakes = mistake_count as u64;
    if mistakes >= total {
        return 0;
    }
    let score = (total - mistakes) * 100 / total;
    score.min(100) as u8
}

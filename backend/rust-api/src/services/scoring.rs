use chrono::Utc;

use crate::models::{ActiveSession, AnswerSlot, Question, QuestionOutcome, SessionResult};
use crate::utils::time::format_elapsed;

pub const POINTS_PER_QUESTION: u32 = 5;

/// Classify one answered slot.
///
/// Constructed responses (no defined correct option) are never penalized:
/// their correctness cannot be verified locally, so any non-empty answer
/// counts as correct. Documented policy, not an incidental fallback.
pub fn question_outcome(question: &Question, answer: &AnswerSlot) -> QuestionOutcome {
    match answer {
        AnswerSlot::Empty => QuestionOutcome::Skipped,
        AnswerSlot::Choice { index } => match question.correct_option {
            Some(correct) if *index == correct => QuestionOutcome::Correct,
            Some(_) => QuestionOutcome::Incorrect,
            None => QuestionOutcome::Correct,
        },
        AnswerSlot::FreeText { text } => match question.correct_option {
            // a free-text reply can never match a discrete answer key
            Some(_) => QuestionOutcome::Incorrect,
            None if text.trim().is_empty() => QuestionOutcome::Skipped,
            None => QuestionOutcome::Correct,
        },
    }
}

/// Reduce a finished session into its immutable result summary.
pub fn score_session(session: &ActiveSession) -> SessionResult {
    score_answers(
        &session.questions,
        &session.answers,
        format_elapsed(session.elapsed(Utc::now())),
    )
}

pub fn score_answers(
    questions: &[Question],
    answers: &[AnswerSlot],
    time_taken: String,
) -> SessionResult {
    let mut correct = 0u32;
    let mut incorrect = 0u32;
    let mut skipped = 0u32;

    for (question, answer) in questions.iter().zip(answers.iter()) {
        match question_outcome(question, answer) {
            QuestionOutcome::Correct => correct += 1,
            QuestionOutcome::Incorrect => incorrect += 1,
            QuestionOutcome::Skipped => skipped += 1,
        }
    }

    let score = correct * POINTS_PER_QUESTION;
    let total = questions.len() as u32 * POINTS_PER_QUESTION;
    let percentage = if total == 0 {
        0.0
    } else {
        100.0 * f64::from(score) / f64::from(total)
    };
    let attempted = correct + incorrect;
    let accuracy = if attempted == 0 {
        0.0
    } else {
        100.0 * f64::from(correct) / f64::from(attempted)
    };

    SessionResult {
        score,
        total,
        percentage,
        accuracy,
        correct,
        incorrect,
        skipped,
        time_taken,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn choice_question(correct: usize) -> Question {
        Question {
            text: "q".to_string(),
            options: Some(vec!["a".to_string(), "b".to_string()]),
            correct_option: Some(correct),
        }
    }

    fn free_text_question() -> Question {
        Question {
            text: "q".to_string(),
            options: None,
            correct_option: None,
        }
    }

    #[test]
    fn correct_answer_counts_and_others_do_not() {
        let q = choice_question(0);
        assert_eq!(
            question_outcome(&q, &AnswerSlot::Choice { index: 0 }),
            QuestionOutcome::Correct
        );
        assert_eq!(
            question_outcome(&q, &AnswerSlot::Choice { index: 1 }),
            QuestionOutcome::Incorrect
        );
        assert_eq!(
            question_outcome(&q, &AnswerSlot::Empty),
            QuestionOutcome::Skipped
        );
    }

    #[test]
    fn free_text_is_never_penalized() {
        let q = free_text_question();
        assert_eq!(
            question_outcome(&q, &AnswerSlot::FreeText { text: "anything".into() }),
            QuestionOutcome::Correct
        );
        assert_eq!(
            question_outcome(&q, &AnswerSlot::Empty),
            QuestionOutcome::Skipped
        );
    }

    #[test]
    fn one_correct_one_skipped() {
        // Q1 answered correctly, Q2 untouched
        let questions = vec![choice_question(0), choice_question(1)];
        let answers = vec![AnswerSlot::Choice { index: 0 }, AnswerSlot::Empty];
        let result = score_answers(&questions, &answers, "0m 10s".to_string());

        assert_eq!(result.correct, 1);
        assert_eq!(result.incorrect, 0);
        assert_eq!(result.skipped, 1);
        assert_eq!(result.score, 5);
        assert_eq!(result.total, 10);
        assert_eq!(result.percentage, 50.0);
        assert_eq!(result.accuracy, 100.0);
    }

    #[test]
    fn counts_always_partition_the_question_set() {
        let questions = vec![
            choice_question(0),
            choice_question(1),
            free_text_question(),
            choice_question(0),
        ];
        let answers = vec![
            AnswerSlot::Choice { index: 1 },
            AnswerSlot::Choice { index: 1 },
            AnswerSlot::Empty,
            AnswerSlot::Empty,
        ];
        let result = score_answers(&questions, &answers, "1m 0s".to_string());
        assert_eq!(
            result.correct + result.incorrect + result.skipped,
            questions.len() as u32
        );
        assert_eq!(result.accuracy, 50.0);
        assert_eq!(result.percentage, 25.0);
    }

    #[test]
    fn empty_question_set_scores_zero_without_dividing() {
        let result = score_answers(&[], &[], "0m 0s".to_string());
        assert_eq!(result.total, 0);
        assert_eq!(result.percentage, 0.0);
        assert_eq!(result.accuracy, 0.0);
    }
}

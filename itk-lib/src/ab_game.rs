//! The A/B deduction game ("bulls and cows" with distinct digits).
//!
//! Everything in here is synchronous and free of gateway calls, the discord side lives in
//! [`crate::commands::ab`].

use ahash::AHashMap;
use chrono::{DateTime, TimeDelta, Utc};
use poise::serenity_prelude::{ChannelId, MessageId};
use rand::{Rng, seq::SliceRandom};
use std::fmt::{self, Display};

pub const MIN_SECRET_LENGTH: usize = 1;
pub const MAX_SECRET_LENGTH: usize = 10;
pub const DEFAULT_SECRET_LENGTH: i64 = 4;

const DIGITS: [u8; 10] = *b"1234567890";

/// How far `started_at` is pushed back from the command, so the prompt itself is
/// newer than the session start when the history is searched during cleanup.
const STARTED_AT_BACKDATE: TimeDelta = TimeDelta::seconds(1);

/// One running game in one channel.
#[derive(Debug, Clone)]
struct Session {
    started_at: DateTime<Utc>,
    secret: Vec<u8>,
    pending_message_ids: Vec<MessageId>,
}

impl Session {
    fn new(secret: Vec<u8>, arrived_at: DateTime<Utc>) -> Self {
        Self {
            started_at: arrived_at - STARTED_AT_BACKDATE,
            secret,
            pending_message_ids: vec![],
        }
    }

    fn secret_length(&self) -> usize {
        self.secret.len()
    }

    fn secret_str(&self) -> String {
        String::from_utf8_lossy(&self.secret).into_owned()
    }

    fn finish(self, channel_id: ChannelId, now: DateTime<Utc>) -> Finished {
        Finished {
            secret: self.secret_str(),
            elapsed: now - self.started_at,
            cleanup: Cleanup {
                channel_id,
                started_at: self.started_at,
                message_ids: self.pending_message_ids,
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Score {
    /// Right digit, right place.
    pub exact: usize,
    /// Right digit, wrong place.
    pub partial: usize,
}

impl Display for Score {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}A{}B", self.exact, self.partial)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Feedback {
    /// The guess repeats a digit, which can never be right.
    Repeated,
    Scored(Score),
}

/// Scores `guess` against `secret`, both of the same length.
///
/// Walks every ordered pair of positions: equal positions count towards `exact`, differing
/// positions count towards `partial`, and a digit that shows up twice in the guess aborts the
/// whole scan with [`Feedback::Repeated`].
pub fn score_guess(guess: &[u8], secret: &[u8]) -> Feedback {
    let mut score = Score {
        exact: 0,
        partial: 0,
    };

    for (i, guessed) in guess.iter().enumerate() {
        for (j, answer) in secret.iter().enumerate() {
            if i == j {
                if guessed == answer {
                    score.exact += 1;
                }
            } else if *guessed == guess[j] {
                return Feedback::Repeated;
            } else if guessed == answer {
                score.partial += 1;
            }
        }
    }

    Feedback::Scored(score)
}

/// Everything needed to tidy up after a session, captured when the session is removed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cleanup {
    pub channel_id: ChannelId,
    pub started_at: DateTime<Utc>,
    pub message_ids: Vec<MessageId>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Finished {
    pub secret: String,
    pub elapsed: TimeDelta,
    pub cleanup: Cleanup,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    Started { secret_length: usize },
    AlreadyActive,
    InvalidLength,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuessOutcome {
    Repeated { secret_length: usize },
    Partial { score: Score, secret_length: usize },
    Solved { score: Score, finished: Finished },
}

/// All running games, keyed by channel.
#[derive(Debug, Default)]
pub struct AbGames {
    sessions: AHashMap<ChannelId, Session>,
}

impl AbGames {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts a game with a secret of `requested_length` digits. The length is taken as typed,
    /// so negative and huge values land on [`StartOutcome::InvalidLength`] too.
    pub fn start(
        &mut self,
        channel_id: ChannelId,
        requested_length: i64,
        arrived_at: DateTime<Utc>,
        rng: &mut impl Rng,
    ) -> StartOutcome {
        let Some(secret_length) = usize::try_from(requested_length)
            .ok()
            .filter(|len| (MIN_SECRET_LENGTH..=MAX_SECRET_LENGTH).contains(len))
        else {
            return StartOutcome::InvalidLength;
        };

        if self.sessions.contains_key(&channel_id) {
            return StartOutcome::AlreadyActive;
        }

        let mut digits = DIGITS;
        let (secret, _) = digits.partial_shuffle(rng, secret_length);

        self.sessions
            .insert(channel_id, Session::new(secret.to_vec(), arrived_at));

        StartOutcome::Started { secret_length }
    }

    /// Appends message ids to the channel's session. Returns `false` when there is no session
    /// anymore, in which case nothing is recorded.
    pub fn track_messages(
        &mut self,
        channel_id: ChannelId,
        message_ids: impl IntoIterator<Item = MessageId>,
    ) -> bool {
        let Some(session) = self.sessions.get_mut(&channel_id) else {
            return false;
        };

        session.pending_message_ids.extend(message_ids);
        true
    }

    /// Returns `None` for anything that isn't a guess: no game in the channel, a bot author,
    /// non digit text, or a guess of the wrong length.
    pub fn submit_guess(
        &mut self,
        channel_id: ChannelId,
        raw_text: &str,
        author_is_bot: bool,
        now: DateTime<Utc>,
    ) -> Option<GuessOutcome> {
        let session = self.sessions.get(&channel_id)?;

        if author_is_bot
            || raw_text.is_empty()
            || !raw_text.bytes().all(|b| b.is_ascii_digit())
            || raw_text.len() != session.secret_length()
        {
            return None;
        }

        let secret_length = session.secret_length();

        match score_guess(raw_text.as_bytes(), &session.secret) {
            Feedback::Repeated => Some(GuessOutcome::Repeated { secret_length }),
            Feedback::Scored(score) if score.exact == secret_length => {
                let session = self.sessions.remove(&channel_id)?;

                Some(GuessOutcome::Solved {
                    score,
                    finished: session.finish(channel_id, now),
                })
            }
            Feedback::Scored(score) => Some(GuessOutcome::Partial {
                score,
                secret_length,
            }),
        }
    }

    pub fn end(&mut self, channel_id: ChannelId, now: DateTime<Utc>) -> Option<Finished> {
        self.sessions
            .remove(&channel_id)
            .map(|session| session.finish(channel_id, now))
    }

    #[cfg(test)]
    fn start_with_secret(&mut self, channel_id: ChannelId, secret: &str, arrived_at: DateTime<Utc>) {
        self.sessions.insert(
            channel_id,
            Session::new(secret.as_bytes().to_vec(), arrived_at),
        );
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::utils::format_elapsed;
    use itertools::Itertools;
    use rand::{SeedableRng, rngs::StdRng};

    fn channel() -> ChannelId {
        ChannelId::new(42)
    }

    fn now() -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000, 0).unwrap()
    }

    fn scored(exact: usize, partial: usize) -> Feedback {
        Feedback::Scored(Score { exact, partial })
    }

    impl AbGames {
        fn session(&self, channel_id: ChannelId) -> Option<&Session> {
            self.sessions.get(&channel_id)
        }
    }

    fn games_with(secret: &str) -> AbGames {
        let mut games = AbGames::new();
        games.start_with_secret(channel(), secret, now());
        games
    }

    #[test]
    fn shifted_digits_count_as_partial() {
        assert_eq!(score_guess(b"1243", b"1234"), scored(2, 2));
        assert_eq!(
            Score {
                exact: 2,
                partial: 2
            }
            .to_string(),
            "2A2B"
        );
    }

    #[test]
    fn repeated_digits_are_rejected_whatever_the_secret() {
        assert_eq!(score_guess(b"1123", b"1234"), Feedback::Repeated);
        assert_eq!(score_guess(b"5675", b"1234"), Feedback::Repeated);
        assert_eq!(score_guess(b"00", b"01"), Feedback::Repeated);
    }

    #[test]
    fn single_digit_games_score() {
        assert_eq!(score_guess(b"7", b"7"), scored(1, 0));
        assert_eq!(score_guess(b"7", b"3"), scored(0, 0));
    }

    #[test]
    fn scores_match_a_direct_count() {
        let mut rng = StdRng::seed_from_u64(7);

        for _ in 0..500 {
            let len = rng.random_range(MIN_SECRET_LENGTH..=MAX_SECRET_LENGTH);
            let mut secret = DIGITS;
            let mut guess = DIGITS;
            let (secret, _) = secret.partial_shuffle(&mut rng, len);
            let (guess, _) = guess.partial_shuffle(&mut rng, len);

            let exact = guess.iter().zip(secret.iter()).filter(|(g, s)| g == s).count();
            let present = guess.iter().filter(|g| secret.contains(*g)).count();

            let Feedback::Scored(score) = score_guess(guess, secret) else {
                panic!("distinct digits were flagged as repeated");
            };

            assert_eq!(score.exact, exact);
            assert_eq!(score.partial, present - exact);
            assert!(score.exact + score.partial <= len);
            assert_eq!(score.exact == len, guess == secret);
        }
    }

    #[test]
    fn secret_length_bounds() {
        let mut games = AbGames::new();
        let mut rng = StdRng::seed_from_u64(1);

        for len in [0, 11, -1, i64::MIN, i64::MAX] {
            assert_eq!(
                games.start(channel(), len, now(), &mut rng),
                StartOutcome::InvalidLength
            );
            assert!(games.session(channel()).is_none());
        }

        for (id, len) in [(1, MIN_SECRET_LENGTH), (2, MAX_SECRET_LENGTH)] {
            assert_eq!(
                games.start(ChannelId::new(id), len as i64, now(), &mut rng),
                StartOutcome::Started { secret_length: len }
            );
            assert_eq!(games.session(ChannelId::new(id)).unwrap().secret_length(), len);
        }
    }

    #[test]
    fn secrets_never_repeat_digits() {
        let mut rng = StdRng::seed_from_u64(99);

        for len in 1..=10 {
            let mut games = AbGames::new();
            games.start(channel(), len, now(), &mut rng);

            let secret = &games.session(channel()).unwrap().secret;
            assert_eq!(secret.len(), len as usize);
            assert!(secret.iter().all_unique());
            assert!(secret.iter().all(u8::is_ascii_digit));
        }
    }

    #[test]
    fn second_start_keeps_the_running_game() {
        let mut games = games_with("1234");
        let mut rng = StdRng::seed_from_u64(3);

        assert_eq!(
            games.start(channel(), 6, now(), &mut rng),
            StartOutcome::AlreadyActive
        );

        let session = games.session(channel()).unwrap();
        assert_eq!(session.secret, b"1234");
        assert_eq!(session.secret_length(), 4);
    }

    #[test]
    fn invalid_length_is_checked_before_the_running_game() {
        let mut games = games_with("1234");
        let mut rng = StdRng::seed_from_u64(3);

        assert_eq!(
            games.start(channel(), 11, now(), &mut rng),
            StartOutcome::InvalidLength
        );
        assert_eq!(games.session(channel()).unwrap().secret, b"1234");
    }

    #[test]
    fn start_is_backdated() {
        let mut games = AbGames::new();
        games.start(channel(), 4, now(), &mut StdRng::seed_from_u64(0));

        assert_eq!(
            games.session(channel()).unwrap().started_at,
            now() - TimeDelta::seconds(1)
        );
    }

    #[test]
    fn non_guesses_are_ignored() {
        let mut games = games_with("1234");

        assert_eq!(games.submit_guess(ChannelId::new(7), "1243", false, now()), None);
        assert_eq!(games.submit_guess(channel(), "1243", true, now()), None);
        assert_eq!(games.submit_guess(channel(), "12a4", false, now()), None);
        assert_eq!(games.submit_guess(channel(), "", false, now()), None);
        assert_eq!(games.submit_guess(channel(), "123", false, now()), None);
        assert_eq!(games.submit_guess(channel(), "12345", false, now()), None);
        assert_eq!(games.submit_guess(channel(), "１２３４", false, now()), None);
        assert!(games.session(channel()).is_some());
    }

    #[test]
    fn partial_guess_keeps_the_game_going() {
        let mut games = games_with("1234");

        assert_eq!(
            games.submit_guess(channel(), "1243", false, now()),
            Some(GuessOutcome::Partial {
                score: Score {
                    exact: 2,
                    partial: 2
                },
                secret_length: 4
            })
        );

        assert!(games.track_messages(channel(), [MessageId::new(10), MessageId::new(11)]));
        assert_eq!(
            games.session(channel()).unwrap().pending_message_ids,
            [MessageId::new(10), MessageId::new(11)]
        );
    }

    #[test]
    fn repeated_guess_changes_nothing() {
        let mut games = games_with("1234");
        games.track_messages(channel(), [MessageId::new(1)]);

        assert_eq!(
            games.submit_guess(channel(), "1123", false, now()),
            Some(GuessOutcome::Repeated { secret_length: 4 })
        );

        let session = games.session(channel()).unwrap();
        assert_eq!(session.secret, b"1234");
        assert_eq!(session.pending_message_ids, [MessageId::new(1)]);
    }

    #[test]
    fn correct_guess_ends_the_game() {
        let mut games = games_with("1234");
        games.track_messages(channel(), [MessageId::new(1), MessageId::new(2)]);

        let later = now() + TimeDelta::seconds(61);
        let Some(GuessOutcome::Solved { score, finished }) =
            games.submit_guess(channel(), "1234", false, later)
        else {
            panic!("expected the game to be solved");
        };

        assert_eq!(score.to_string(), "4A0B");
        assert_eq!(finished.secret, "1234");
        assert_eq!(finished.elapsed, TimeDelta::seconds(62));
        assert_eq!(
            finished.cleanup,
            Cleanup {
                channel_id: channel(),
                started_at: now() - TimeDelta::seconds(1),
                message_ids: vec![MessageId::new(1), MessageId::new(2)],
            }
        );
        assert!(games.session(channel()).is_none());
        assert!(!games.track_messages(channel(), [MessageId::new(3)]));
    }

    #[test]
    fn ending_without_a_game_is_rejected() {
        let mut games = games_with("1234");

        assert_eq!(games.end(ChannelId::new(5), now()), None);
        assert_eq!(games.sessions.len(), 1);
    }

    #[test]
    fn ending_reveals_the_secret() {
        let mut games = games_with("907");
        games.track_messages(channel(), [MessageId::new(8)]);

        let finished = games.end(channel(), now() + TimeDelta::seconds(9)).unwrap();

        assert_eq!(finished.secret, "907");
        assert_eq!(format_elapsed(finished.elapsed), "00:00:10");
        assert_eq!(finished.cleanup.message_ids, vec![MessageId::new(8)]);
        assert!(games.sessions.is_empty());
    }

    #[test]
    fn restart_during_cleanup_delay_gets_a_fresh_game() {
        // The session is gone as soon as the game is solved, so the channel can start a new one
        // while the old cleanup is still waiting. The snapshot keeps the two apart.
        let mut games = games_with("1234");
        games.track_messages(channel(), [MessageId::new(1)]);

        let Some(GuessOutcome::Solved { finished, .. }) =
            games.submit_guess(channel(), "1234", false, now())
        else {
            panic!("expected the game to be solved");
        };

        let mut rng = StdRng::seed_from_u64(11);
        assert_eq!(
            games.start(channel(), 4, now(), &mut rng),
            StartOutcome::Started { secret_length: 4 }
        );
        games.track_messages(channel(), [MessageId::new(2)]);

        assert_eq!(finished.cleanup.message_ids, vec![MessageId::new(1)]);
        assert_eq!(
            games.session(channel()).unwrap().pending_message_ids,
            [MessageId::new(2)]
        );
    }
}

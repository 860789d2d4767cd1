//! Record enrichment
//!
//! Adds derived display fields to raw API records before they are cached.
//! Enrichment never fails: missing or empty fields fall back to fixed
//! sentinels. Placeholder values the API does not provide (online status,
//! engagement counters, publish dates) are drawn from an injected
//! `RandomSource`.

use chrono::{DateTime, Utc};
use std::sync::Arc;

use super::{Address, EnrichedPost, EnrichedUser, Post, User};
use crate::clock::Clock;
use crate::random::RandomSource;

/// Shown when a user has no usable address parts
pub const UNKNOWN_ADDRESS: &str = "Unknown address";

/// Shown when a user has neither a name nor a username
pub const UNKNOWN_USER: &str = "Unknown user";

/// Maximum excerpt length in characters, before the ellipsis
pub const EXCERPT_MAX_CHARS: usize = 120;

/// Appended to truncated excerpts
pub const ELLIPSIS: &str = "...";

/// Reading speed used for the read-time estimate
pub const WORDS_PER_MINUTE: usize = 200;

/// Probability threshold above which a user is shown as online
const ONLINE_THRESHOLD: f64 = 0.3;

/// Upper bound (exclusive) of the placeholder like counter
const MAX_LIKES: u32 = 100;

/// Upper bound (exclusive) of the placeholder comment counter
const MAX_COMMENTS: u32 = 20;

/// Earliest placeholder publish date: 2020-01-01T00:00:00Z
const PUBLISHED_AT_START_MILLIS: i64 = 1_577_836_800_000;

/// Formats an address as a single line
///
/// Joins suite, street, city and zipcode with ", ", skipping empty parts.
/// Returns `UNKNOWN_ADDRESS` when there is nothing to show.
pub fn format_address(address: Option<&Address>) -> String {
    let Some(address) = address else {
        return UNKNOWN_ADDRESS.to_string();
    };

    let parts: Vec<&str> = [
        address.suite.as_str(),
        address.street.as_str(),
        address.city.as_str(),
        address.zipcode.as_str(),
    ]
    .into_iter()
    .map(str::trim)
    .filter(|part| !part.is_empty())
    .collect();

    if parts.is_empty() {
        UNKNOWN_ADDRESS.to_string()
    } else {
        parts.join(", ")
    }
}

/// Picks the name to show for a user: `name`, then `username`
pub fn display_name(user: &User) -> String {
    [user.name.trim(), user.username.trim()]
        .into_iter()
        .find(|candidate| !candidate.is_empty())
        .unwrap_or(UNKNOWN_USER)
        .to_string()
}

/// Builds a deterministic avatar URL from a display name
pub fn avatar_url(display_name: &str) -> String {
    format!(
        "https://ui-avatars.com/api/?name={}&background=random",
        urlencoding::encode(display_name)
    )
}

/// Produces a one-line excerpt of a post body
///
/// Newlines become spaces and surrounding whitespace is trimmed. Bodies longer
/// than `EXCERPT_MAX_CHARS` characters are cut and get `ELLIPSIS` appended.
pub fn create_excerpt(body: &str) -> String {
    let cleaned = body.replace("\r\n", " ").replace(['\n', '\r'], " ");
    let cleaned = cleaned.trim();

    if cleaned.chars().count() > EXCERPT_MAX_CHARS {
        let mut excerpt: String = cleaned.chars().take(EXCERPT_MAX_CHARS).collect();
        excerpt.push_str(ELLIPSIS);
        excerpt
    } else {
        cleaned.to_string()
    }
}

/// Estimated minutes to read `body`: `ceil(words / 200)`
pub fn read_time_minutes(body: &str) -> u32 {
    let words = body.split_whitespace().count();
    words.div_ceil(WORDS_PER_MINUTE) as u32
}

/// Adds display fields to a raw user
pub fn enrich_user(user: User, rng: &dyn RandomSource) -> EnrichedUser {
    let display_name = display_name(&user);
    EnrichedUser {
        full_address: format_address(user.address.as_ref()),
        avatar_url: avatar_url(&display_name),
        display_name,
        is_online: rng.unit() > ONLINE_THRESHOLD,
        user,
    }
}

/// Adds display fields and placeholder engagement data to a raw post
///
/// `now_millis` bounds the placeholder publish date.
pub fn enrich_post(post: Post, now_millis: i64, rng: &dyn RandomSource) -> EnrichedPost {
    let published_at = placeholder_publish_date(now_millis, rng);
    let likes = scaled(rng, MAX_LIKES);
    let comments = scaled(rng, MAX_COMMENTS);

    EnrichedPost {
        excerpt: create_excerpt(&post.body),
        read_time_minutes: read_time_minutes(&post.body),
        published_at,
        likes,
        comments,
        post,
    }
}

/// Maps a unit draw onto `0..max`
fn scaled(rng: &dyn RandomSource, max: u32) -> u32 {
    ((rng.unit() * f64::from(max)).floor() as u32).min(max.saturating_sub(1))
}

/// Picks a date uniformly between 2020-01-01 and `now_millis`
fn placeholder_publish_date(now_millis: i64, rng: &dyn RandomSource) -> DateTime<Utc> {
    let span = now_millis.saturating_sub(PUBLISHED_AT_START_MILLIS).max(0);
    let offset = (rng.unit() * span as f64) as i64;
    DateTime::from_timestamp_millis(PUBLISHED_AT_START_MILLIS + offset).unwrap_or_default()
}

/// Enrichment stage with its clock and random source bound
///
/// The orchestrator owns one of these and applies it to every fetched record.
#[derive(Clone)]
pub struct Enricher {
    clock: Arc<dyn Clock>,
    rng: Arc<dyn RandomSource>,
}

impl Enricher {
    pub fn new(clock: Arc<dyn Clock>, rng: Arc<dyn RandomSource>) -> Self {
        Self { clock, rng }
    }

    /// Enriches every user, preserving order
    pub fn users(&self, users: Vec<User>) -> Vec<EnrichedUser> {
        users
            .into_iter()
            .map(|user| enrich_user(user, self.rng.as_ref()))
            .collect()
    }

    /// Enriches every post, preserving order
    pub fn posts(&self, posts: Vec<Post>) -> Vec<EnrichedPost> {
        let now = self.clock.now_millis();
        posts
            .into_iter()
            .map(|post| enrich_post(post, now, self.rng.as_ref()))
            .collect()
    }
}

impl std::fmt::Debug for Enricher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Enricher").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::random::{FixedRandom, SequenceRandom};

    fn address(suite: &str, street: &str, city: &str, zipcode: &str) -> Address {
        Address {
            street: street.to_string(),
            suite: suite.to_string(),
            city: city.to_string(),
            zipcode: zipcode.to_string(),
            geo: None,
        }
    }

    #[test]
    fn test_format_address_skips_empty_suite() {
        let addr = address("", "Main", "Springfield", "00000");
        assert_eq!(format_address(Some(&addr)), "Main, Springfield, 00000");
    }

    #[test]
    fn test_format_address_full() {
        let addr = address("Apt. 556", "Kulas Light", "Gwenborough", "92998-3874");
        assert_eq!(
            format_address(Some(&addr)),
            "Apt. 556, Kulas Light, Gwenborough, 92998-3874"
        );
    }

    #[test]
    fn test_format_address_all_empty_is_sentinel() {
        let addr = address("", "", "", "");
        assert_eq!(format_address(Some(&addr)), UNKNOWN_ADDRESS);
        assert_eq!(format_address(Some(&address(" ", "", "\t", ""))), UNKNOWN_ADDRESS);
    }

    #[test]
    fn test_format_address_missing_is_sentinel() {
        assert_eq!(format_address(None), UNKNOWN_ADDRESS);
    }

    #[test]
    fn test_display_name_prefers_name() {
        let user = User {
            name: "Leanne Graham".to_string(),
            username: "Bret".to_string(),
            ..Default::default()
        };
        assert_eq!(display_name(&user), "Leanne Graham");
    }

    #[test]
    fn test_display_name_falls_back_to_username() {
        let user = User {
            username: "Bret".to_string(),
            ..Default::default()
        };
        assert_eq!(display_name(&user), "Bret");
        assert_eq!(display_name(&User::default()), UNKNOWN_USER);
    }

    #[test]
    fn test_avatar_url_is_encoded_and_deterministic() {
        let url = avatar_url("Leanne Graham");
        assert_eq!(
            url,
            "https://ui-avatars.com/api/?name=Leanne%20Graham&background=random"
        );
        assert_eq!(url, avatar_url("Leanne Graham"));
        assert!(avatar_url("A&B").contains("name=A%26B&"));
    }

    #[test]
    fn test_excerpt_truncates_long_body() {
        let body = "a".repeat(200);
        let excerpt = create_excerpt(&body);
        assert_eq!(excerpt.len(), EXCERPT_MAX_CHARS + ELLIPSIS.len());
        assert!(excerpt.ends_with(ELLIPSIS));
        assert_eq!(&excerpt[..EXCERPT_MAX_CHARS], &body[..EXCERPT_MAX_CHARS]);
    }

    #[test]
    fn test_excerpt_short_body_unchanged() {
        let body = "b".repeat(50);
        assert_eq!(create_excerpt(&body), body);
    }

    #[test]
    fn test_excerpt_exactly_max_is_not_truncated() {
        let body = "c".repeat(EXCERPT_MAX_CHARS);
        assert_eq!(create_excerpt(&body), body);
    }

    #[test]
    fn test_excerpt_collapses_newlines() {
        assert_eq!(
            create_excerpt("quia et suscipit\nsuscipit recusandae\r\nconsequuntur"),
            "quia et suscipit suscipit recusandae consequuntur"
        );
        assert_eq!(create_excerpt("\nedge\n"), "edge");
        assert_eq!(create_excerpt(""), "");
    }

    #[test]
    fn test_excerpt_counts_characters_not_bytes() {
        let body = "é".repeat(130);
        let excerpt = create_excerpt(&body);
        assert_eq!(excerpt.chars().count(), EXCERPT_MAX_CHARS + ELLIPSIS.len());
    }

    #[test]
    fn test_read_time_rounds_up() {
        assert_eq!(read_time_minutes("one two three"), 1);
        assert_eq!(read_time_minutes(&"word ".repeat(200)), 1);
        assert_eq!(read_time_minutes(&"word ".repeat(201)), 2);
        assert_eq!(read_time_minutes("  spaced\n\nout\twords  "), 1);
        assert_eq!(read_time_minutes(""), 0);
    }

    #[test]
    fn test_enrich_user_online_threshold() {
        let user = User {
            id: 1,
            name: "Leanne Graham".to_string(),
            ..Default::default()
        };
        assert!(enrich_user(user.clone(), &FixedRandom(0.31)).is_online);
        assert!(!enrich_user(user.clone(), &FixedRandom(0.3)).is_online);
        assert!(!enrich_user(user, &FixedRandom(0.0)).is_online);
    }

    #[test]
    fn test_enrich_user_fills_display_fields() {
        let user = User {
            id: 1,
            username: "Bret".to_string(),
            address: Some(address("", "Main", "Springfield", "00000")),
            ..Default::default()
        };
        let enriched = enrich_user(user.clone(), &FixedRandom(0.9));

        assert_eq!(enriched.user, user);
        assert_eq!(enriched.display_name, "Bret");
        assert_eq!(enriched.full_address, "Main, Springfield, 00000");
        assert!(enriched.avatar_url.contains("name=Bret"));
    }

    #[test]
    fn test_enrich_post_with_fixed_randomness() {
        let now = PUBLISHED_AT_START_MILLIS + 1_000_000;
        let post = Post {
            id: 1,
            user_id: 1,
            title: "title".to_string(),
            body: "short body".to_string(),
        };

        let enriched = enrich_post(post, now, &SequenceRandom::new(vec![0.5, 0.25, 0.5]));

        assert_eq!(enriched.excerpt, "short body");
        assert_eq!(enriched.read_time_minutes, 1);
        assert_eq!(
            enriched.published_at.timestamp_millis(),
            PUBLISHED_AT_START_MILLIS + 500_000
        );
        assert_eq!(enriched.likes, 25);
        assert_eq!(enriched.comments, 10);
    }

    #[test]
    fn test_enrich_post_counters_stay_in_range() {
        let enriched = enrich_post(Post::default(), PUBLISHED_AT_START_MILLIS, &FixedRandom(1.0));
        assert!(enriched.likes < MAX_LIKES);
        assert!(enriched.comments < MAX_COMMENTS);
        assert_eq!(enriched.published_at.timestamp_millis(), PUBLISHED_AT_START_MILLIS);
    }

    #[test]
    fn test_enrich_post_clock_before_start_is_clamped() {
        let enriched = enrich_post(Post::default(), 0, &FixedRandom(0.7));
        assert_eq!(enriched.published_at.timestamp_millis(), PUBLISHED_AT_START_MILLIS);
    }

    #[test]
    fn test_enricher_is_deterministic_with_fixed_sources() {
        let enricher = Enricher::new(
            Arc::new(ManualClock::new(PUBLISHED_AT_START_MILLIS + 10_000)),
            Arc::new(FixedRandom(0.5)),
        );
        let users = vec![
            User {
                id: 1,
                name: "A".to_string(),
                ..Default::default()
            },
            User {
                id: 2,
                name: "B".to_string(),
                ..Default::default()
            },
        ];

        let first = enricher.users(users.clone());
        let second = enricher.users(users);

        assert_eq!(first, second);
        assert_eq!(first.len(), 2);
        assert_eq!(first[1].user.id, 2);

        let posts = enricher.posts(vec![Post::default(), Post::default()]);
        assert_eq!(posts[0], posts[1]);
    }
}

//! # Phrase sets and announcement templates.
//!
//! A [`PhraseBook`] is injected into each [`EventManager`](crate::EventManager) at
//! construction; two managers never share mutable tables.
//!
//! Templates use `{user}`, `{amount}` and `{reward}` placeholders and are prefixed
//! with the kind's face. Phrases match as case-insensitive substrings.

use std::collections::HashMap;

use rand::Rng;
use rand::seq::IndexedRandom;

use crate::rewards::kind::RewardKind;

/// Phrases and templates of one reward kind.
#[derive(Clone, Debug, Default)]
pub struct Phrases {
    /// Name used in templates (`{reward}`).
    pub name: String,
    /// Prefix of every announcement.
    pub face: String,

    /// Event arrival announcements.
    pub arrival: Vec<String>,
    /// Departure announcements when someone claimed.
    pub departure: Vec<String>,
    /// Departure announcements when nobody claimed.
    pub no_people: Vec<String>,
    /// Grant announcements (`{user}`, `{amount}`, `{reward}`).
    pub give: Vec<String>,
    /// Grant announcements inside the last-chance window.
    pub last_second: Vec<String>,
    /// Replies to greedy claims (`{user}`, `{reward}`).
    pub greed_reply: Vec<String>,
    /// Replies to rude claims (`{user}`, `{reward}`).
    pub rude_reply: Vec<String>,

    /// Phrases that request a reward.
    pub agree: Vec<String>,
    /// Phrases that ask for more after a grant.
    pub greed: Vec<String>,
    /// Phrases that request a reward rudely.
    pub rude: Vec<String>,
}

impl Phrases {
    /// Default English phrases for a reward called `name`.
    pub fn defaults(name: &str) -> Self {
        let agree = owned(AGREE);
        let mut greed = agree.clone();
        greed.extend(owned(GREED_EXTRA));

        Self {
            name: name.to_string(),
            face: "(^=˃ᆺ˂)".to_string(),
            arrival: owned(ARRIVAL),
            departure: owned(DEPARTURE),
            no_people: owned(NO_PEOPLE),
            give: owned(GIVE),
            last_second: owned(LAST_SECOND),
            greed_reply: owned(GREED_REPLY),
            rude_reply: owned(RUDE_REPLY),
            agree,
            greed,
            rude: owned(RUDE),
        }
    }

    /// Whether `text` contains one of the agreement phrases.
    pub fn is_agree(&self, text: &str) -> bool {
        contains_any(&self.agree, text)
    }

    /// Whether `text` contains one of the greedy phrases.
    pub fn is_greedy(&self, text: &str) -> bool {
        contains_any(&self.greed, text)
    }

    /// Whether `text` contains one of the rude phrases.
    pub fn is_rude(&self, text: &str) -> bool {
        contains_any(&self.rude, text)
    }
}

/// Phrase tables for every reward kind.
#[derive(Clone, Debug)]
pub struct PhraseBook<K> {
    entries: HashMap<K, Phrases>,
}

impl<K: RewardKind> Default for PhraseBook<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: RewardKind> PhraseBook<K> {
    /// Creates an empty book: no kind matches anything and nothing is announced.
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    /// Book with [`Phrases::defaults`] for every kind.
    pub fn with_defaults() -> Self {
        let entries = K::variants()
            .iter()
            .map(|k| (*k, Phrases::defaults(k.name())))
            .collect();
        Self { entries }
    }

    /// Replaces the phrases of one kind.
    pub fn insert(&mut self, kind: K, phrases: Phrases) -> &mut Self {
        self.entries.insert(kind, phrases);
        self
    }

    /// Phrases of one kind.
    pub fn get(&self, kind: K) -> Option<&Phrases> {
        self.entries.get(&kind)
    }

    pub(crate) fn arrival<R: Rng + ?Sized>(&self, kind: K, rng: &mut R) -> Option<String> {
        self.render(kind, rng, |p| &p.arrival, "", 0)
    }

    pub(crate) fn departure<R: Rng + ?Sized>(
        &self,
        kind: K,
        rng: &mut R,
        anyone: bool,
    ) -> Option<String> {
        if anyone {
            self.render(kind, rng, |p| &p.departure, "", 0)
        } else {
            self.render(kind, rng, |p| &p.no_people, "", 0)
        }
    }

    pub(crate) fn give<R: Rng + ?Sized>(
        &self,
        kind: K,
        rng: &mut R,
        user: &str,
        amount: u64,
        last_second: bool,
    ) -> Option<String> {
        if last_second {
            self.render(kind, rng, |p| &p.last_second, user, amount)
        } else {
            self.render(kind, rng, |p| &p.give, user, amount)
        }
    }

    pub(crate) fn greed_reply<R: Rng + ?Sized>(
        &self,
        kind: K,
        rng: &mut R,
        user: &str,
    ) -> Option<String> {
        self.render(kind, rng, |p| &p.greed_reply, user, 0)
    }

    pub(crate) fn rude_reply<R: Rng + ?Sized>(
        &self,
        kind: K,
        rng: &mut R,
        user: &str,
    ) -> Option<String> {
        self.render(kind, rng, |p| &p.rude_reply, user, 1)
    }

    fn render<R, F>(&self, kind: K, rng: &mut R, pick: F, user: &str, amount: u64) -> Option<String>
    where
        R: Rng + ?Sized,
        F: Fn(&Phrases) -> &Vec<String>,
    {
        let phrases = self.get(kind)?;
        let template = pick(phrases).choose(rng)?;
        let body = template
            .replace("{user}", user)
            .replace("{amount}", &amount.to_string())
            .replace("{reward}", &phrases.name);
        Some(if phrases.face.is_empty() {
            body
        } else {
            format!("{} {}", phrases.face, body)
        })
    }
}

fn contains_any(phrases: &[String], text: &str) -> bool {
    let text = text.to_lowercase();
    phrases.iter().any(|p| text.contains(&p.to_lowercase()))
}

fn owned(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| (*s).to_string()).collect()
}

const ARRIVAL: &[&str] = &[
    "It's snack time!",
    "I'm back with s'more {reward}! Who wants!?",
    "I got {reward}! If nobody wants em, I'm gonna eat em all!!",
    "Hey, I'm back! Anybody in the mood for some {reward}?!",
    "Got another {reward} delivery guys!",
    "Did somebody say {reward}?!?! o/",
    "Pstt.. I got the {reward} you were lookin for. <.<",
    "Beep beep! I got a {reward} delivery comin in! Who wants some?",
    "So who's gonna help me eat all these {reward}? :3",
];

const DEPARTURE: &[&str] = &[
    "I'm out of {reward}! I'll be back with more soon.",
    "Aight, I gotta head out! I'll be back with more, don worry :3",
    "Alright, I gotta get back to my errands. I'll see you guys soon!",
];

const NO_PEOPLE: &[&str] = &[
    "I guess nobody wants {reward}... more for me!",
    "Guess nobody's here.. I'll just head out then",
    "I guess i'll just come back later..",
];

const GIVE: &[&str] = &[
    "Here ya go, {user}, here's {amount} {reward}!",
    "Alright here ya go, {user}, {amount} {reward} for you!",
    "Of course {user}! Here's {amount} {reward}!",
    "Ok {user}, here's {amount} {reward} for you. Anyone else want some?",
];

const LAST_SECOND: &[&str] = &[
    "Fine fine, {user}, I'll give you {amount} of my on-the-road {reward}.. Cya!",
    "Oh! {user}, you caught me right before I left! Alright, i'll give you {amount} of my own {reward}",
];

const GREED_REPLY: &[&str] = &[
    "Don't be greedy now! you already got some {reward} {user}!",
    "You already got your {reward} {user}!",
    "Come on {user}, you already got your {reward}! We gotta make sure there's some for errbody!",
];

const RUDE_REPLY: &[&str] = &["Wow, you're rude. Have one {reward}, {user}."];

const AGREE: &[&str] = &[
    "holds out hand",
    "im ready",
    "i'm ready",
    "hit me up",
    "hand over",
    "hand me",
    "kindly",
    "i want",
    "i'll have",
    "ill have",
    "yes",
    "pls",
    "plz",
    "please",
    "por favor",
    "can i",
    "i'd like",
    "i would",
    "may i",
    "in my mouth",
    "in my belly",
    "snack me",
    "gimme",
    "give me",
    "i'll take",
    "ill take",
    "i am",
    "about me",
    "me too",
    "of course",
    "me want",
];

const GREED_EXTRA: &[&str] = &[
    "more pl",
    "i have some more",
    "i want more",
    "i have another",
    "i have more",
    "more snack",
];

const RUDE: &[&str] = &["hand over"];

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rewards::kind::Snack;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn matching_ignores_case() {
        let p = Phrases::defaults("cookies");
        assert!(p.is_agree("YES PLEASE"));
        assert!(p.is_rude("Hand Over the goods"));
        assert!(p.is_greedy("i want MORE"));
        assert!(!p.is_agree("nope"));
    }

    #[test]
    fn templates_fill_placeholders() {
        let book = PhraseBook::<Snack>::with_defaults();
        let mut rng = StdRng::seed_from_u64(5);
        let msg = book
            .give(Snack::Pretzel, &mut rng, "ada", 7, false)
            .expect("default give templates");
        assert!(msg.contains("ada"));
        assert!(msg.contains('7'));
        assert!(msg.contains("pretzels"));
        assert!(!msg.contains('{'));
    }

    #[test]
    fn empty_book_announces_nothing() {
        let book = PhraseBook::<Snack>::new();
        let mut rng = StdRng::seed_from_u64(5);
        assert!(book.arrival(Snack::Cookie, &mut rng).is_none());
        assert!(book.get(Snack::Cookie).is_none());
    }

    #[test]
    fn books_are_independent() {
        let mut custom = PhraseBook::<Snack>::with_defaults();
        let mut tea = Phrases::defaults("tea");
        tea.agree = vec!["tea time".into()];
        custom.insert(Snack::Cookie, tea);

        let stock = PhraseBook::<Snack>::with_defaults();
        assert!(custom.get(Snack::Cookie).map(|p| p.is_agree("tea time")).unwrap_or(false));
        assert!(!stock.get(Snack::Cookie).map(|p| p.is_agree("tea time")).unwrap_or(true));
    }
}

use rand::Rng;

#[derive(Clone, Copy, Debug)]
pub struct Quote {
    pub text: &'static str,
    pub author: &'static str,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum QuoteContext {
    Strategic,
    Kazakh,
}

pub const STRATEGIC_QUOTES: [Quote; 5] = [
    Quote {
        text: "The supreme art of war is to subdue the enemy without fighting.",
        author: "Sun Tzu",
    },
    Quote {
        text: "In battle, numbers alone confer no advantage. Do not advance relying on sheer military power.",
        author: "Sun Tzu",
    },
    Quote {
        text: "The strong warrior is not aggressive, the effective fighter is not angry.",
        author: "Lao Tzu",
    },
    Quote {
        text: "Unity is strength... when there is teamwork and collaboration, wonderful things can be achieved.",
        author: "Mattie Stepanek",
    },
    Quote {
        text: "The art of war is simple enough. Find out where your enemy is. Get at him as soon as you can.",
        author: "Ulysses S. Grant",
    },
];

pub const KAZAKH_QUOTES: [Quote; 3] = [
    Quote {
        text: "A warrior's honor is his most precious possession.",
        author: "Kazakh Proverb",
    },
    Quote {
        text: "The steppe knows no boundaries, but the warrior knows his homeland.",
        author: "Kazakh Proverb",
    },
    Quote {
        text: "Victory comes not to the swift, but to the wise.",
        author: "Kazakh Proverb",
    },
];

pub fn random_quote(context: QuoteContext) -> Quote {
    let list: &[Quote] = match context {
        QuoteContext::Strategic => &STRATEGIC_QUOTES,
        QuoteContext::Kazakh => &KAZAKH_QUOTES,
    };
    list[rand::rng().random_range(0..list.len())]
}

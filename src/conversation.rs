use chrono::Local;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Turn {
    pub role: Role,
    pub content: String,
    pub timestamp: String,
}

impl Turn {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            timestamp: Local::now().format("%H:%M:%S").to_string(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }
}

/// Append-only conversation log. The system turn is fixed at construction.
#[derive(Debug, Clone)]
pub struct MessageStore {
    turns: Vec<Turn>,
}

impl MessageStore {
    pub fn new(system_prompt: impl Into<String>) -> Self {
        Self {
            turns: vec![Turn::new(Role::System, system_prompt)],
        }
    }

    /// Appends a user or assistant turn. System turns after the first are
    /// stored as user turns so the leading system turn stays unique.
    pub fn append(&mut self, mut turn: Turn) {
        if turn.role == Role::System {
            tracing::warn!("Refusing a second system turn; storing it as a user turn");
            turn.role = Role::User;
        }
        self.turns.push(turn);
    }

    /// Every turn in conversation order, system turn first.
    pub fn snapshot(&self) -> &[Turn] {
        &self.turns
    }

    /// Turns the user should see.
    pub fn visible(&self) -> impl Iterator<Item = &Turn> {
        self.turns.iter().filter(|turn| turn.role != Role::System)
    }

    pub fn last(&self) -> Option<&Turn> {
        self.turns.last()
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }
}

/// Best-effort details picked up from what the user says in chat.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SessionProfile {
    pub name: Option<String>,
    pub profession: Option<String>,
    pub contact: Option<String>,
    pub project_type: Option<String>,
}

const PROJECT_KEYWORDS: &[(&str, &str)] = &[
    ("residential", "Residential"),
    ("house", "Residential"),
    ("home", "Residential"),
    ("villa", "Residential"),
    ("commercial", "Commercial"),
    ("office", "Commercial"),
    ("shop", "Commercial"),
    ("industrial", "Industrial"),
    ("factory", "Industrial"),
    ("warehouse", "Industrial"),
    ("infrastructure", "Infrastructure"),
    ("road", "Infrastructure"),
    ("bridge", "Infrastructure"),
];

const NAME_MARKERS: &[&str] = &["my name is ", "this is ", "call me ", "i am ", "i'm "];

impl SessionProfile {
    /// Updates fields from one user message. Returns true if anything changed.
    pub fn observe(&mut self, text: &str) -> bool {
        let before = self.clone();
        let lowercase = text.to_lowercase();

        if self.name.is_none() {
            self.name = NAME_MARKERS
                .iter()
                .filter_map(|marker| word_after(text, &lowercase, marker))
                .find(|word| looks_like_name(word));
        }

        if let Some(profession) = ["i am a ", "i am an ", "i'm a ", "i'm an ", "i work as a ", "i work as an "]
            .iter()
            .find_map(|marker| word_after(text, &lowercase, marker))
        {
            self.profession = Some(profession.to_lowercase());
        }

        if let Some(contact) = find_contact(text) {
            self.contact = Some(contact);
        }

        if let Some((_, project)) = PROJECT_KEYWORDS
            .iter()
            .find(|(keyword, _)| lowercase.split(|c: char| !c.is_alphanumeric()).any(|w| w == *keyword))
        {
            self.project_type = Some((*project).to_string());
        }

        *self != before
    }

    pub fn welcome(&self) -> Option<String> {
        self.name.as_ref().map(|name| format!("Welcome, {}!", name))
    }
}

// "I am Ravi" but not "I am a contractor" or "call me at 5".
fn looks_like_name(word: &str) -> bool {
    word.chars().next().is_some_and(char::is_uppercase) && !matches!(word, "A" | "An" | "The" | "At")
}

/// The word following `marker`, taken from the original-case text.
fn word_after(text: &str, lowercase: &str, marker: &str) -> Option<String> {
    let start = lowercase.find(marker)? + marker.len();
    // Lowercasing can change byte lengths outside ASCII.
    let rest = text.get(start..)?;
    let word: String = rest
        .chars()
        .take_while(|c| c.is_alphabetic() || *c == '-' || *c == '\'')
        .collect();
    if word.is_empty() {
        None
    } else {
        Some(word)
    }
}

fn find_contact(text: &str) -> Option<String> {
    let separators = |c: char| c.is_whitespace() || c == ',' || c == ';';
    if let Some(email) = text
        .split(separators)
        .map(|token| token.trim_matches(|c: char| !c.is_alphanumeric()))
        .find(|token| {
            token
                .split_once('@')
                .is_some_and(|(user, domain)| !user.is_empty() && domain.contains('.'))
        })
    {
        return Some(email.to_string());
    }

    text.split(separators)
        .map(|token| token.chars().filter(char::is_ascii_digit).collect::<String>())
        .find(|digits| digits.len() >= 10)
}

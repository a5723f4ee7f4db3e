//! Canned answers for questions about using the application

const USAGE_MARKERS: &[&str] = &[
    "how to",
    "how do i",
    "help me",
    "guide",
    "instructions",
    "tutorial",
    "explain",
    "what is",
    "where is",
    "can't find",
    "don't understand",
];

struct Topic {
    triggers: &'static [&'static str],
    answer: &'static str,
}

const TOPICS: &[Topic] = &[
    Topic {
        triggers: &["add entry", "create entry", "new entry", "insert entry"],
        answer: "**Adding an entry**\n\n\
            1. Open **Insert Entry** from the navigation bar\n\
            2. Fill in the title, tags and any notes\n\
            3. Tick the conditions that apply, or load one of your condition templates\n\
            4. Attach files if needed and press **Submit**",
    },
    Topic {
        triggers: &["search", "find entry", "look for"],
        answer: "**Searching entries**\n\n\
            1. Open **Search Entries** from the navigation bar\n\
            2. Filter by author, tags, title, text or a date range\n\
            3. Results update as you type\n\n\
            You can also ask me directly, for example *\"find entries about western blots from last month\"*.",
    },
    Topic {
        triggers: &["edit entry", "update entry", "modify entry"],
        answer: "**Editing an entry**\n\n\
            1. Find the entry with the search page\n\
            2. Open it and press **Edit**\n\
            3. Change the fields or conditions and press **Save**",
    },
    Topic {
        triggers: &["delete entry", "remove entry"],
        answer: "**Deleting an entry**\n\n\
            1. Find the entry with the search page\n\
            2. Open it and press **Delete**\n\
            3. Confirm when asked\n\n\
            Entries that named it as their parent keep existing but lose the link. \
            Deletion cannot be undone.",
    },
    Topic {
        triggers: &["user management", "add user", "manage users"],
        answer: "**Managing users** (administrators only)\n\n\
            Open **Admin > User Management** to add, edit or remove users.",
    },
    Topic {
        triggers: &["backup", "restore", "export"],
        answer: "**Backup and restore** (administrators only)\n\n\
            Open **Admin > Backup** to create a backup or restore a previous one.",
    },
    Topic {
        triggers: &["orders", "order management"],
        answer: "**Orders**\n\n\
            Open **Resources > Orders** to view orders, create one with **New Order**, \
            or update the status of orders you placed.",
    },
    Topic {
        triggers: &["protocols", "view protocols"],
        answer: "**Protocols**\n\n\
            Open **Resources > Protocols**, pick a protocol to see its details \
            and use **Download** to keep a copy.",
    },
    Topic {
        triggers: &["conditions", "templates", "condition templates"],
        answer: "**Condition templates**\n\n\
            Open **Resources > Conditions Templates** to browse the condition taxonomy \
            of each method. Tick conditions under *default* and give a name to save a new \
            template, edit an existing template in place, or mark templates for deletion.",
    },
    Topic {
        triggers: &["profile", "account", "password"],
        answer: "**Your profile**\n\n\
            Click your username in the top-right corner and choose **Profile** \
            to update your details or change your password.",
    },
    Topic {
        triggers: &["logout", "sign out"],
        answer: "**Logging out**\n\n\
            Click your username in the top-right corner and choose **Logout**.",
    },
];

const GENERIC_ANSWER: &str = "**Welcome!**\n\n\
    I can explain how to use the application, for example how to add, edit or search \
    entries and how to manage condition templates.\n\n\
    I can also search for you: try *\"find experiments from last week\"*.";

/// Whether the query asks how to use the application rather than for entries
pub fn is_usage_question(query: &str) -> bool {
    let query = query.to_lowercase();
    USAGE_MARKERS.iter().any(|marker| query.contains(marker))
}

/// The answer for the first topic the query mentions, or a generic one
pub fn usage_help(query: &str) -> &'static str {
    let query = query.to_lowercase();
    TOPICS
        .iter()
        .find(|topic| topic.triggers.iter().any(|t| query.contains(t)))
        .map(|topic| topic.answer)
        .unwrap_or(GENERIC_ANSWER)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detects_usage_questions() {
        assert!(is_usage_question("How do I add a new entry?"));
        assert!(is_usage_question("I can't find the backup page"));
        assert!(!is_usage_question("entries by john about protein synthesis"));
    }

    #[test]
    fn test_topic_answers() {
        assert!(usage_help("how to create entry").contains("Adding an entry"));
        assert!(usage_help("where is the logout button").contains("Logging out"));
        assert!(usage_help("explain condition templates").contains("Condition templates"));
    }

    #[test]
    fn test_generic_answer() {
        assert_eq!(usage_help("what is this"), GENERIC_ANSWER);
    }
}

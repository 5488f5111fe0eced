//! Navigation block rendering and marker-delimited upsert.
//!
//! Every PR body in a train carries a table of contents between fixed
//! sentinel markers. Re-synchronization replaces the region between the
//! markers (markers included) exactly once; bodies without the markers get
//! the block appended. The upsert is textually idempotent.

use crate::types::PrNumber;

/// Marker opening the navigation block in a PR body.
pub const TOC_START: &str = "<pr-train-toc>";

/// Marker closing the navigation block in a PR body.
pub const TOC_END: &str = "</pr-train-toc>";

/// One line of the navigation block, in train order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NavigationEntry {
    pub number: PrNumber,
    pub title: String,
    pub is_combined: bool,
    /// True for the branch whose PR body this block is rendered into.
    pub is_current: bool,
}

/// Renders the delimited navigation block for one owning PR.
pub fn render(entries: &[NavigationEntry]) -> String {
    let mut block = String::new();
    block.push_str(TOC_START);
    block.push_str("\n\n#### PR train\n\n");
    for (ordinal, entry) in entries.iter().enumerate() {
        let pointer = if entry.is_current { "👉 " } else { "" };
        let combined = if entry.is_combined {
            "[combined branch] "
        } else {
            ""
        };
        let here = if entry.is_current {
            " **YOU ARE HERE**"
        } else {
            ""
        };
        block.push_str(&format!(
            "{}. {}{} {}{}{}\n",
            ordinal + 1,
            pointer,
            entry.number,
            combined,
            entry.title,
            here
        ));
    }
    block.push('\n');
    block.push_str(TOC_END);
    block
}

/// Inserts or replaces the navigation block in a PR body.
///
/// If the body already contains the delimiter pair, the entire delimited
/// region (delimiters included) is replaced; otherwise the block is appended
/// to the end of the body, separated by one newline.
pub fn upsert(body: &str, block: &str) -> String {
    if let Some(start) = body.find(TOC_START)
        && let Some(end_rel) = body[start..].find(TOC_END)
    {
        let end = start + end_rel + TOC_END.len();
        return format!("{}{}{}", &body[..start], block, &body[end..]);
    }

    if body.is_empty() {
        block.to_string()
    } else {
        format!("{}\n{}", body, block)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn three_entries(current: usize) -> Vec<NavigationEntry> {
        vec![
            NavigationEntry {
                number: PrNumber(101),
                title: "Add parser".into(),
                is_combined: false,
                is_current: current == 0,
            },
            NavigationEntry {
                number: PrNumber(102),
                title: "Add codegen".into(),
                is_combined: false,
                is_current: current == 1,
            },
            NavigationEntry {
                number: PrNumber(103),
                title: "Whole feature".into(),
                is_combined: true,
                is_current: current == 2,
            },
        ]
    }

    #[test]
    fn renders_all_entries_in_train_order() {
        let block = render(&three_entries(1));
        let expected = "\
<pr-train-toc>

#### PR train

1. #101 Add parser
2. 👉 #102 Add codegen **YOU ARE HERE**
3. #103 [combined branch] Whole feature

</pr-train-toc>";
        assert_eq!(block, expected);
    }

    #[test]
    fn upsert_appends_when_no_markers() {
        let block = render(&three_entries(0));
        let body = "Original description.";
        let updated = upsert(body, &block);
        assert!(updated.starts_with("Original description.\n"));
        assert!(updated.ends_with(TOC_END));
        assert_eq!(updated.matches(TOC_START).count(), 1);
    }

    #[test]
    fn upsert_into_empty_body() {
        let block = render(&three_entries(0));
        assert_eq!(upsert("", &block), block);
    }

    #[test]
    fn upsert_replaces_existing_block() {
        let old_block = render(&three_entries(0));
        let body = format!("Description.\n{}\nTrailing text.", old_block);

        let new_block = render(&three_entries(2));
        let updated = upsert(&body, &new_block);

        assert!(updated.contains("Description."));
        assert!(updated.contains("Trailing text."));
        assert!(updated.contains("👉 #103"));
        assert!(!updated.contains("👉 #101"));
        assert_eq!(updated.matches(TOC_START).count(), 1);
        assert_eq!(updated.matches(TOC_END).count(), 1);
    }

    #[test]
    fn upsert_is_idempotent() {
        let block = render(&three_entries(1));
        let once = upsert("Some body text.", &block);
        let twice = upsert(&once, &block);
        assert_eq!(once, twice);
    }

    proptest! {
        /// Upserting the same block twice never changes the body again,
        /// whatever the body looked like beforehand.
        #[test]
        fn upsert_idempotent_for_arbitrary_bodies(body in "[ -~\\n]{0,200}") {
            let block = render(&three_entries(0));
            let once = upsert(&body, &block);
            let twice = upsert(&once, &block);
            prop_assert_eq!(once, twice);
        }

        /// The upserted body contains the block exactly once.
        #[test]
        fn upsert_never_duplicates(body in "[ -~\\n]{0,200}") {
            let block = render(&three_entries(0));
            let updated = upsert(&body, &block);
            prop_assert_eq!(updated.matches(TOC_START).count(), 1);
        }
    }
}

/// A payload at its nesting level, with the payloads nested beneath it.
#[derive(Debug, Clone, PartialEq)]
pub struct Nested<T> {
    pub level: u8,
    pub item: T,
    pub children: Vec<Nested<T>>,
}

/// Rebuild a tree from a flat, document-ordered sequence of (level, payload)
/// pairs. A pair becomes a child of the nearest preceding pair with a
/// shallower level; equal levels are siblings, never nested. A sequence that
/// opens below level 1 still yields top-level entries; no root is
/// synthesized. Total over any input, preserves order at every depth.
pub fn nest_by_level<T, I>(records: I) -> Vec<Nested<T>>
where
    I: IntoIterator<Item = (u8, T)>,
{
    let mut forest = Vec::new();
    let mut stack: Vec<Nested<T>> = Vec::new();

    for (level, item) in records {
        // Anything at the same or a deeper level cannot enclose this record.
        while stack.last().is_some_and(|open| open.level >= level) {
            close_top(&mut forest, &mut stack);
        }
        stack.push(Nested {
            level,
            item,
            children: Vec::new(),
        });
    }

    while !stack.is_empty() {
        close_top(&mut forest, &mut stack);
    }

    forest
}

fn close_top<T>(forest: &mut Vec<Nested<T>>, stack: &mut Vec<Nested<T>>) {
    if let Some(node) = stack.pop() {
        match stack.last_mut() {
            Some(parent) => parent.children.push(node),
            None => forest.push(node),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn items<'a>(forest: &[Nested<&'a str>]) -> Vec<&'a str> {
        forest.iter().map(|n| n.item).collect()
    }

    #[test]
    fn two_top_level_trees() {
        let forest = nest_by_level([
            (1, "Abstract"),
            (2, "Background"),
            (2, "Objective"),
            (1, "Methods"),
            (3, "Data"),
        ]);
        assert_eq!(items(&forest), ["Abstract", "Methods"]);
        assert_eq!(items(&forest[0].children), ["Background", "Objective"]);
        assert_eq!(items(&forest[1].children), ["Data"]);
        assert!(forest[0].children[0].children.is_empty());
    }

    #[test]
    fn equal_levels_stay_siblings() {
        let forest = nest_by_level([(2, "a"), (2, "b"), (2, "c")]);
        assert_eq!(items(&forest), ["a", "b", "c"]);
        assert!(forest.iter().all(|n| n.children.is_empty()));
    }

    #[test]
    fn shallow_record_closes_every_open_ancestor() {
        let forest = nest_by_level([(1, "a"), (2, "b"), (3, "c"), (3, "d"), (1, "e")]);
        assert_eq!(items(&forest), ["a", "e"]);
        assert_eq!(items(&forest[0].children), ["b"]);
        assert_eq!(items(&forest[0].children[0].children), ["c", "d"]);
        assert!(forest[1].children.is_empty());
    }

    #[test]
    fn sequence_starting_deep_gets_no_synthetic_root() {
        let forest = nest_by_level([(3, "a"), (2, "b"), (4, "c")]);
        assert_eq!(items(&forest), ["a", "b"]);
        assert_eq!(items(&forest[1].children), ["c"]);
    }

    #[test]
    fn level_jump_down_then_up_shares_a_parent() {
        // b opens at 3, c at 2: both end up children of a, in order.
        let forest = nest_by_level([(1, "a"), (3, "b"), (2, "c")]);
        assert_eq!(items(&forest), ["a"]);
        assert_eq!(items(&forest[0].children), ["b", "c"]);
    }

    #[test]
    fn empty_input() {
        let forest: Vec<Nested<()>> = nest_by_level([]);
        assert!(forest.is_empty());
    }

    #[test]
    fn sibling_order_preserved_at_depth() {
        let forest = nest_by_level([
            (1, "r"),
            (2, "s1"),
            (3, "s1a"),
            (3, "s1b"),
            (2, "s2"),
            (3, "s2a"),
        ]);
        assert_eq!(items(&forest[0].children), ["s1", "s2"]);
        assert_eq!(items(&forest[0].children[0].children), ["s1a", "s1b"]);
        assert_eq!(items(&forest[0].children[1].children), ["s2a"]);
    }
}

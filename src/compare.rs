//! Item comparators.

use std::cmp::Ordering;

/// Ordering strategy shared by the priority queue, the merger and the sorter.
///
/// Any closure or function of type `Fn(&T, &T) -> Ordering` is a comparator. The comparator must be consistent
/// across calls (antisymmetric and transitive), otherwise the sorting result is undefined.
pub trait Comparator<T: ?Sized> {
    /// Compares two items.
    fn compare(&self, a: &T, b: &T) -> Ordering;
}

impl<T, F> Comparator<T> for F
where
    T: ?Sized,
    F: Fn(&T, &T) -> Ordering,
{
    fn compare(&self, a: &T, b: &T) -> Ordering {
        self(a, b)
    }
}

/// Orders items using their [`Ord`] implementation.
#[derive(Debug, Clone, Copy, Default)]
pub struct NaturalOrder;

impl<T: Ord + ?Sized> Comparator<T> for NaturalOrder {
    fn compare(&self, a: &T, b: &T) -> Ordering {
        a.cmp(b)
    }
}

/// Comparator adapter reversing the wrapped order.
#[derive(Debug, Clone, Copy, Default)]
pub struct Reversed<C>(C);

impl<C> Reversed<C> {
    /// Wraps a comparator ordering items in the opposite direction.
    pub fn new(compare: C) -> Self {
        Reversed(compare)
    }
}

impl<T, C> Comparator<T> for Reversed<C>
where
    T: ?Sized,
    C: Comparator<T>,
{
    fn compare(&self, a: &T, b: &T) -> Ordering {
        self.0.compare(b, a)
    }
}

const LINE_NUMBER_SEPARATOR: char = '.';

/// Orders lines of the form `<number>.<text>`.
///
/// Lines are compared by `<text>` ignoring case first, ties are broken by `<number>` numerically.
/// Prefixes that are not valid integers go after numeric ones and are compared as strings.
/// Lines without a separator go after all numbered lines.
#[derive(Debug, Clone, Copy, Default)]
pub struct NumberedLineComparator;

impl NumberedLineComparator {
    fn compare_lines(a: &str, b: &str) -> Ordering {
        match (a.split_once(LINE_NUMBER_SEPARATOR), b.split_once(LINE_NUMBER_SEPARATOR)) {
            (Some((a_num, a_text)), Some((b_num, b_text))) => {
                compare_ignore_case(a_text, b_text).then_with(|| compare_numbers(a_num, b_num))
            }
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => compare_ignore_case(a, b),
        }
    }
}

impl Comparator<str> for NumberedLineComparator {
    fn compare(&self, a: &str, b: &str) -> Ordering {
        Self::compare_lines(a, b)
    }
}

impl Comparator<String> for NumberedLineComparator {
    fn compare(&self, a: &String, b: &String) -> Ordering {
        Self::compare_lines(a, b)
    }
}

fn compare_ignore_case(a: &str, b: &str) -> Ordering {
    a.chars()
        .flat_map(char::to_uppercase)
        .cmp(b.chars().flat_map(char::to_uppercase))
}

fn compare_numbers(a: &str, b: &str) -> Ordering {
    match (a.trim().parse::<i64>(), b.trim().parse::<i64>()) {
        (Ok(a), Ok(b)) => a.cmp(&b),
        (Ok(_), Err(_)) => Ordering::Less,
        (Err(_), Ok(_)) => Ordering::Greater,
        (Err(_), Err(_)) => a.cmp(b),
    }
}

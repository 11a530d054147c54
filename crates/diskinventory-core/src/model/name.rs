/// Filesystem-name collation.
///
/// Names are compared the way a file browser lists them: case-insensitively,
/// with runs of ASCII digits compared by numeric value so `file9` sorts
/// before `file10`. Only names that are equal under those rules fall back to
/// raw code-point order, which keeps the ordering total.
use std::cmp::Ordering;
use std::iter::Peekable;
use std::str::Chars;

/// Compare two names as a file browser would.
pub fn compare_filesystem_names(a: &str, b: &str) -> Ordering {
    let mut left = a.chars().peekable();
    let mut right = b.chars().peekable();

    loop {
        match (left.peek().copied(), right.peek().copied()) {
            (None, None) => return a.cmp(b),
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(l), Some(r)) if l.is_ascii_digit() && r.is_ascii_digit() => {
                let ord = compare_digit_runs(&mut left, &mut right);
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            (Some(l), Some(r)) => {
                left.next();
                right.next();
                let ord = l.to_lowercase().cmp(r.to_lowercase());
                if ord != Ordering::Equal {
                    return ord;
                }
            }
        }
    }
}

/// Consume one digit run from each side and compare them numerically.
///
/// Leading zeros are ignored for the value comparison; `007` and `7` compare
/// equal here and are separated by the final raw comparison.
fn compare_digit_runs(left: &mut Peekable<Chars<'_>>, right: &mut Peekable<Chars<'_>>) -> Ordering {
    let l = take_digits(left);
    let r = take_digits(right);
    let l = l.trim_start_matches('0');
    let r = r.trim_start_matches('0');
    l.len().cmp(&r.len()).then_with(|| l.cmp(r))
}

fn take_digits(chars: &mut Peekable<Chars<'_>>) -> String {
    let mut run = String::new();
    while let Some(&c) = chars.peek() {
        if !c.is_ascii_digit() {
            break;
        }
        run.push(c);
        chars.next();
    }
    run
}

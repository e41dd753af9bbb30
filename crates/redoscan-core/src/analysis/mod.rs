//! Analysis primitives shared by the classifier and the fix generators:
//! - Path-following engine: generic fork/join symbolic traversal
//! - Consumed-character analyzer: per-iteration character algebra
//! - First-character analyzer: conservative first-consumed-character sets
//! - Structural predicates: backreference, zero-length and direction facts

mod consumed;
mod first_char;
mod paths;
mod predicates;

pub use consumed::{
    assert_consumed, can_reach_child, concat_consumed, is_stared, union_consumed, ConsumedChars,
    ConsumedRepeatedChar,
};
pub use first_char::{
    first_char_after, first_consumed_char, first_consumed_char_after, first_consumed_char_concat,
    first_consumed_char_union, FirstConsumedChar, FirstLookChar,
};
pub use paths::{
    follow_paths, FollowMode, FollowOperations, MatchingDirection, PathEnd,
};
pub use predicates::{
    backreference_always_after_group, get_length_range, is_empty, is_empty_backreference,
    is_potentially_empty, is_potentially_zero_length, is_zero_length, matching_direction_of,
    LengthRange,
};

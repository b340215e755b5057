//! Short shareable codes for recipes.
//!
//! The code is derived from the recipe id: the low bits are reversed so
//! neighbouring ids give unrelated codes, then the value is written in base 31
//! over a shuffled alphabet. Codes are stored so that only links handed out
//! by `get_short_link` resolve.

use log::debug;

use super::recipes::find_recipe;
use crate::{error::Error, schema::Id, store::Store};

const ALPHABET: &[u8] = b"mn6j2c4rv8bpygw95z7hsdaetxuk3fq";
const BLOCK_SIZE: u32 = 24;
const MIN_LENGTH: usize = 5;

/// Reverses the low `BLOCK_SIZE` bits. Applying it twice gives `n` back.
fn scramble(n: u64) -> u64 {
    let mask = (1u64 << BLOCK_SIZE) - 1;
    let low = n & mask;
    let reversed = (0..BLOCK_SIZE)
        .filter(|bit| low & (1 << bit) != 0)
        .fold(0, |acc, bit| acc | 1 << (BLOCK_SIZE - 1 - bit));

    (n & !mask) | reversed
}

pub fn encode(recipe_id: Id) -> String {
    let base = ALPHABET.len() as u64;
    let mut value = scramble(u64::from(recipe_id.unsigned_abs()));

    let mut digits = Vec::with_capacity(MIN_LENGTH);
    loop {
        digits.push(ALPHABET[(value % base) as usize]);
        value /= base;
        if value == 0 {
            break;
        }
    }
    while digits.len() < MIN_LENGTH {
        digits.push(ALPHABET[0]);
    }

    digits.iter().rev().map(|&b| char::from(b)).collect()
}

/// `None` for characters outside the alphabet or values out of id range.
pub fn decode(code: &str) -> Option<Id> {
    let base = ALPHABET.len() as u64;
    let mut value: u64 = 0;
    for c in code.bytes() {
        let digit = ALPHABET.iter().position(|&a| a == c)? as u64;
        value = value.checked_mul(base)?.checked_add(digit)?;
    }

    Id::try_from(scramble(value)).ok()
}

/// Path of the short link for the recipe, stored on first request.
pub async fn get_short_link<S: Store + ?Sized>(store: &S, recipe_id: Id) -> Result<String, Error> {
    find_recipe(store, recipe_id).await?;

    let code = encode(recipe_id);
    store.save_short_link(&code, recipe_id).await?;
    debug!("Short link {code} points to recipe {recipe_id}");

    Ok(format!("/s/{code}/"))
}

pub async fn resolve_short_link<S: Store + ?Sized>(store: &S, code: &str) -> Result<Id, Error> {
    let unknown = || Error::not_found("Short link does not exist");
    if decode(code).is_none() {
        return Err(unknown());
    }

    store.find_short_link(code).await?.ok_or_else(unknown)
}

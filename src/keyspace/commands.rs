//! Built-in command handlers.

use super::{Data, Db, Entry};
use crate::{Error, Result, Value};
use bytes::Bytes;
use std::collections::{BTreeSet, HashMap};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

pub(crate) type Handler = fn(&mut Db, &[String]) -> Result<Value>;

/// Argument count accepted by a command, not counting the command name.
#[derive(Debug, Clone, Copy)]
pub(crate) enum Arity {
    Exact(usize),
    AtLeast(usize),
    Range(usize, usize),
}

impl Arity {
    pub(crate) fn accepts(self, n: usize) -> bool {
        match self {
            Arity::Exact(e) => n == e,
            Arity::AtLeast(min) => n >= min,
            Arity::Range(min, max) => (min..=max).contains(&n),
        }
    }
}

/// Resolves an upper-cased command name to its handler.
pub(crate) fn lookup(command: &str) -> Option<(Handler, Arity)> {
    let entry: (Handler, Arity) = match command {
        "PING" => (ping, Arity::Range(0, 1)),
        "GET" => (get, Arity::Exact(1)),
        "SET" => (set, Arity::AtLeast(2)),
        "DEL" => (del, Arity::AtLeast(1)),
        "EXISTS" => (exists, Arity::AtLeast(1)),
        "INCR" => (incr, Arity::Exact(1)),
        "DECR" => (decr, Arity::Exact(1)),
        "INCRBY" => (incrby, Arity::Exact(2)),
        "DECRBY" => (decrby, Arity::Exact(2)),
        "EXPIRE" => (expire, Arity::Exact(2)),
        "PEXPIRE" => (pexpire, Arity::Exact(2)),
        "PERSIST" => (persist, Arity::Exact(1)),
        "TTL" => (ttl, Arity::Exact(1)),
        "PTTL" => (pttl, Arity::Exact(1)),
        "SADD" => (sadd, Arity::AtLeast(2)),
        "SCARD" => (scard, Arity::Exact(1)),
        "SMEMBERS" => (smembers, Arity::Exact(1)),
        "ZADD" => (zadd, Arity::AtLeast(3)),
        "ZCARD" => (zcard, Arity::Exact(1)),
        "CLIENT" => (client, Arity::AtLeast(1)),
        "DBSIZE" => (dbsize, Arity::Exact(0)),
        "FLUSHALL" => (flushall, Arity::Exact(0)),
        _ => return None,
    };
    Some(entry)
}

fn ok() -> Value {
    Value::Text("OK".to_string())
}

fn parse_int(s: &str) -> Result<i64> {
    s.parse::<i64>()
        .map_err(|_| Error::command("ERR value is not an integer or out of range"))
}

fn parse_float(s: &str) -> Result<f64> {
    match s.parse::<f64>() {
        Ok(f) if !f.is_nan() => Ok(f),
        _ => Err(Error::command("ERR value is not a valid float")),
    }
}

fn ping(_db: &mut Db, args: &[String]) -> Result<Value> {
    Ok(match args.first() {
        Some(msg) => Value::Text(msg.clone()),
        None => Value::Text("PONG".to_string()),
    })
}

fn get(db: &mut Db, args: &[String]) -> Result<Value> {
    match db.entry(&args[0]) {
        None => Ok(Value::Nil),
        Some(Entry {
            data: Data::Str(bytes),
            ..
        }) => Ok(Value::Text(String::from_utf8_lossy(bytes).into_owned())),
        Some(_) => Err(Error::wrong_type()),
    }
}

fn set(db: &mut Db, args: &[String]) -> Result<Value> {
    let ttl = match &args[2..] {
        [] => None,
        [unit, amount] => {
            let amount = parse_int(amount)?;
            if amount <= 0 {
                return Err(Error::command("ERR invalid expire time in 'set' command"));
            }
            let millis = match unit.to_ascii_uppercase().as_str() {
                "EX" => amount.checked_mul(1000),
                "PX" => Some(amount),
                _ => return Err(Error::command("ERR syntax error")),
            };
            Some(deadline(millis, "set")?)
        }
        _ => return Err(Error::command("ERR syntax error")),
    };

    let mut entry = Entry::new(Data::Str(Bytes::from(args[1].clone().into_bytes())));
    entry.expires_at = ttl;
    db.entries.insert(args[0].clone(), entry);
    Ok(ok())
}

fn del(db: &mut Db, args: &[String]) -> Result<Value> {
    let removed = args.iter().filter(|key| db.remove(key)).count();
    Ok(Value::Integer(removed as i64))
}

fn exists(db: &mut Db, args: &[String]) -> Result<Value> {
    let found = args.iter().filter(|key| db.contains(key)).count();
    Ok(Value::Integer(found as i64))
}

fn incr_by(db: &mut Db, key: &str, delta: i64) -> Result<Value> {
    let current = match db.entry(key) {
        None => 0,
        Some(Entry {
            data: Data::Str(bytes),
            ..
        }) => parse_int(&String::from_utf8_lossy(bytes))?,
        Some(_) => return Err(Error::wrong_type()),
    };
    let next = current
        .checked_add(delta)
        .ok_or_else(|| Error::command("ERR increment or decrement would overflow"))?;

    let data = Data::Str(Bytes::from(next.to_string().into_bytes()));
    match db.entry(key) {
        Some(entry) => entry.data = data,
        None => {
            db.entries.insert(key.to_string(), Entry::new(data));
        }
    }
    Ok(Value::Integer(next))
}

fn incr(db: &mut Db, args: &[String]) -> Result<Value> {
    incr_by(db, &args[0], 1)
}

fn decr(db: &mut Db, args: &[String]) -> Result<Value> {
    incr_by(db, &args[0], -1)
}

fn incrby(db: &mut Db, args: &[String]) -> Result<Value> {
    incr_by(db, &args[0], parse_int(&args[1])?)
}

fn decrby(db: &mut Db, args: &[String]) -> Result<Value> {
    let delta = parse_int(&args[1])?
        .checked_neg()
        .ok_or_else(|| Error::command("ERR decrement would overflow"))?;
    incr_by(db, &args[0], delta)
}

/// Absolute expiry for a positive `millis` from now. Like Redis, a TTL whose
/// unix-millisecond deadline overflows an i64 is rejected.
fn deadline(millis: Option<i64>, command: &str) -> Result<Instant> {
    let unix_ms = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_millis() as i64);
    millis
        .filter(|ms| ms.checked_add(unix_ms).is_some())
        .and_then(|ms| Instant::now().checked_add(Duration::from_millis(ms as u64)))
        .ok_or_else(|| {
            Error::command(format!("ERR invalid expire time in '{}' command", command))
        })
}

fn expire_in(db: &mut Db, key: &str, at: Instant) -> Result<Value> {
    match db.entry(key) {
        None => Ok(Value::Integer(0)),
        Some(entry) => {
            entry.expires_at = Some(at);
            Ok(Value::Integer(1))
        }
    }
}

fn expire(db: &mut Db, args: &[String]) -> Result<Value> {
    let secs = parse_int(&args[1])?;
    if secs <= 0 {
        return Ok(Value::Integer(i64::from(db.remove(&args[0]))));
    }
    let at = deadline(secs.checked_mul(1000), "expire")?;
    expire_in(db, &args[0], at)
}

fn pexpire(db: &mut Db, args: &[String]) -> Result<Value> {
    let millis = parse_int(&args[1])?;
    if millis <= 0 {
        return Ok(Value::Integer(i64::from(db.remove(&args[0]))));
    }
    let at = deadline(Some(millis), "pexpire")?;
    expire_in(db, &args[0], at)
}

fn persist(db: &mut Db, args: &[String]) -> Result<Value> {
    match db.entry(&args[0]) {
        Some(entry) if entry.expires_at.is_some() => {
            entry.expires_at = None;
            Ok(Value::Integer(1))
        }
        _ => Ok(Value::Integer(0)),
    }
}

/// Remaining TTL in the unit chosen by `scale`, with -2 for a missing key and
/// -1 for a key without expiry.
fn remaining(db: &mut Db, key: &str, scale: fn(Duration) -> i64) -> Value {
    let now = Instant::now();
    match db.entry(key) {
        None => Value::Integer(-2),
        Some(entry) => match entry.ttl(now) {
            None => Value::Integer(-1),
            Some(left) => Value::Integer(scale(left)),
        },
    }
}

fn ttl(db: &mut Db, args: &[String]) -> Result<Value> {
    Ok(remaining(db, &args[0], |d| {
        (d.as_millis() as i64).saturating_add(500) / 1000
    }))
}

fn pttl(db: &mut Db, args: &[String]) -> Result<Value> {
    Ok(remaining(db, &args[0], |d| d.as_millis() as i64))
}

fn sadd(db: &mut Db, args: &[String]) -> Result<Value> {
    let key = &args[0];
    if db.entry(key).is_none() {
        db.entries
            .insert(key.clone(), Entry::new(Data::Set(BTreeSet::new())));
    }
    match db.entry(key) {
        Some(Entry {
            data: Data::Set(members),
            ..
        }) => {
            let added = args[1..]
                .iter()
                .filter(|m| members.insert((*m).clone()))
                .count();
            Ok(Value::Integer(added as i64))
        }
        _ => Err(Error::wrong_type()),
    }
}

fn scard(db: &mut Db, args: &[String]) -> Result<Value> {
    match db.entry(&args[0]) {
        None => Ok(Value::Integer(0)),
        Some(Entry {
            data: Data::Set(members),
            ..
        }) => Ok(Value::Integer(members.len() as i64)),
        Some(_) => Err(Error::wrong_type()),
    }
}

fn smembers(db: &mut Db, args: &[String]) -> Result<Value> {
    match db.entry(&args[0]) {
        None => Ok(Value::Sequence(Vec::new())),
        Some(Entry {
            data: Data::Set(members),
            ..
        }) => Ok(Value::Sequence(
            members.iter().cloned().map(Value::Text).collect(),
        )),
        Some(_) => Err(Error::wrong_type()),
    }
}

fn zadd(db: &mut Db, args: &[String]) -> Result<Value> {
    let key = &args[0];
    let pairs = &args[1..];
    if pairs.len() % 2 != 0 {
        return Err(Error::command("ERR syntax error"));
    }
    let scored = pairs
        .chunks(2)
        .map(|pair| Ok((parse_float(&pair[0])?, pair[1].clone())))
        .collect::<Result<Vec<_>>>()?;

    if db.entry(key).is_none() {
        db.entries
            .insert(key.clone(), Entry::new(Data::ZSet(HashMap::new())));
    }
    match db.entry(key) {
        Some(Entry {
            data: Data::ZSet(members),
            ..
        }) => {
            let added = scored
                .into_iter()
                .filter(|(score, member)| members.insert(member.clone(), *score).is_none())
                .count();
            Ok(Value::Integer(added as i64))
        }
        _ => Err(Error::wrong_type()),
    }
}

fn zcard(db: &mut Db, args: &[String]) -> Result<Value> {
    match db.entry(&args[0]) {
        None => Ok(Value::Integer(0)),
        Some(Entry {
            data: Data::ZSet(members),
            ..
        }) => Ok(Value::Integer(members.len() as i64)),
        Some(_) => Err(Error::wrong_type()),
    }
}

fn client(db: &mut Db, args: &[String]) -> Result<Value> {
    let sub = args[0].to_ascii_lowercase();
    match (sub.as_str(), &args[1..]) {
        ("setname", [name]) => {
            if name.contains(' ') {
                return Err(Error::command(
                    "ERR Client names cannot contain spaces, newlines or special characters.",
                ));
            }
            db.client.name = Some(name.clone());
            Ok(ok())
        }
        ("getname", []) => Ok(Value::from(db.client.name.clone())),
        ("setname", _) | ("getname", _) => Err(Error::command(format!(
            "ERR wrong number of arguments for 'client|{}' command",
            sub
        ))),
        _ => Err(Error::command(format!(
            "ERR unsupported CLIENT subcommand '{}'",
            args[0]
        ))),
    }
}

fn dbsize(db: &mut Db, _args: &[String]) -> Result<Value> {
    Ok(Value::Integer(db.live_len() as i64))
}

fn flushall(db: &mut Db, _args: &[String]) -> Result<Value> {
    db.entries.clear();
    Ok(ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(db: &mut Db, command: &str, items: &[&str]) -> Result<Value> {
        let args: Vec<String> = items.iter().map(|s| s.to_string()).collect();
        let (handler, arity) = lookup(command).unwrap();
        assert!(arity.accepts(args.len()), "bad arity in test for {}", command);
        handler(db, &args)
    }

    #[test]
    fn test_set_get_del() {
        let mut db = Db::default();
        assert_eq!(run(&mut db, "GET", &["k"]).unwrap(), Value::Nil);
        assert_eq!(run(&mut db, "SET", &["k", "v"]).unwrap(), ok());
        assert_eq!(run(&mut db, "GET", &["k"]).unwrap(), Value::from("v"));
        assert_eq!(run(&mut db, "DEL", &["k", "missing"]).unwrap(), Value::Integer(1));
        assert_eq!(run(&mut db, "GET", &["k"]).unwrap(), Value::Nil);
    }

    #[test]
    fn test_exists_counts_repeats() {
        let mut db = Db::default();
        run(&mut db, "SET", &["a", "1"]).unwrap();
        assert_eq!(
            run(&mut db, "EXISTS", &["a", "a", "b"]).unwrap(),
            Value::Integer(2)
        );
    }

    #[test]
    fn test_incr_family() {
        let mut db = Db::default();
        assert_eq!(run(&mut db, "INCR", &["n"]).unwrap(), Value::Integer(1));
        assert_eq!(run(&mut db, "INCRBY", &["n", "10"]).unwrap(), Value::Integer(11));
        assert_eq!(run(&mut db, "DECRBY", &["n", "4"]).unwrap(), Value::Integer(7));
        assert_eq!(run(&mut db, "DECR", &["n"]).unwrap(), Value::Integer(6));
        assert_eq!(run(&mut db, "GET", &["n"]).unwrap(), Value::from("6"));

        run(&mut db, "SET", &["s", "abc"]).unwrap();
        assert!(run(&mut db, "INCR", &["s"]).is_err());
    }

    #[test]
    fn test_set_with_expiry_options() {
        let mut db = Db::default();
        run(&mut db, "SET", &["k", "v", "PX", "60000"]).unwrap();
        match run(&mut db, "PTTL", &["k"]).unwrap() {
            Value::Integer(ms) => assert!(ms > 0 && ms <= 60000),
            other => panic!("unexpected {:?}", other),
        }
        assert!(run(&mut db, "SET", &["k", "v", "XX", "1"]).is_err());
        assert!(run(&mut db, "SET", &["k", "v", "EX", "0"]).is_err());
    }

    #[test]
    fn test_pttl_states() {
        let mut db = Db::default();
        assert_eq!(run(&mut db, "PTTL", &["k"]).unwrap(), Value::Integer(-2));
        run(&mut db, "SET", &["k", "v"]).unwrap();
        assert_eq!(run(&mut db, "PTTL", &["k"]).unwrap(), Value::Integer(-1));
        assert_eq!(run(&mut db, "PEXPIRE", &["k", "5000"]).unwrap(), Value::Integer(1));
        match run(&mut db, "PTTL", &["k"]).unwrap() {
            Value::Integer(ms) => assert!(ms > 0 && ms <= 5000),
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(run(&mut db, "TTL", &["k"]).unwrap(), Value::Integer(5));
        assert_eq!(run(&mut db, "PERSIST", &["k"]).unwrap(), Value::Integer(1));
        assert_eq!(run(&mut db, "PTTL", &["k"]).unwrap(), Value::Integer(-1));
        assert_eq!(run(&mut db, "PEXPIRE", &["nope", "10"]).unwrap(), Value::Integer(0));
    }

    #[test]
    fn test_expired_key_is_gone() {
        let mut db = Db::default();
        run(&mut db, "SET", &["k", "v"]).unwrap();
        run(&mut db, "PEXPIRE", &["k", "1"]).unwrap();
        std::thread::sleep(Duration::from_millis(5));
        assert_eq!(run(&mut db, "GET", &["k"]).unwrap(), Value::Nil);
        assert_eq!(run(&mut db, "PTTL", &["k"]).unwrap(), Value::Integer(-2));
    }

    #[test]
    fn test_non_positive_expire_deletes() {
        let mut db = Db::default();
        run(&mut db, "SET", &["k", "v"]).unwrap();
        assert_eq!(run(&mut db, "EXPIRE", &["k", "0"]).unwrap(), Value::Integer(1));
        assert_eq!(run(&mut db, "EXISTS", &["k"]).unwrap(), Value::Integer(0));
    }

    #[test]
    fn test_sets() {
        let mut db = Db::default();
        assert_eq!(run(&mut db, "SCARD", &["s"]).unwrap(), Value::Integer(0));
        assert_eq!(run(&mut db, "SADD", &["s", "b", "a", "b"]).unwrap(), Value::Integer(2));
        assert_eq!(run(&mut db, "SCARD", &["s"]).unwrap(), Value::Integer(2));
        assert_eq!(
            run(&mut db, "SMEMBERS", &["s"]).unwrap(),
            Value::from(vec!["a", "b"])
        );
    }

    #[test]
    fn test_zcard() {
        let mut db = Db::default();
        assert_eq!(run(&mut db, "ZCARD", &["z"]).unwrap(), Value::Integer(0));
        assert_eq!(
            run(&mut db, "ZADD", &["z", "1", "one", "2", "two"]).unwrap(),
            Value::Integer(2)
        );
        assert_eq!(run(&mut db, "ZADD", &["z", "3", "one"]).unwrap(), Value::Integer(0));
        assert_eq!(run(&mut db, "ZCARD", &["z"]).unwrap(), Value::Integer(2));
        assert!(run(&mut db, "ZADD", &["z", "x", "bad"]).is_err());

        run(&mut db, "SET", &["str", "v"]).unwrap();
        assert_eq!(run(&mut db, "ZCARD", &["str"]).unwrap_err(), Error::wrong_type());
    }

    #[test]
    fn test_client_name() {
        let mut db = Db::default();
        assert_eq!(run(&mut db, "CLIENT", &["getname"]).unwrap(), Value::Nil);
        assert_eq!(run(&mut db, "CLIENT", &["SETNAME", "Johnson"]).unwrap(), ok());
        assert_eq!(
            run(&mut db, "CLIENT", &["getname"]).unwrap(),
            Value::from("Johnson")
        );
        assert!(run(&mut db, "CLIENT", &["kill"]).is_err());
        assert!(run(&mut db, "CLIENT", &["setname", "a b"]).is_err());
    }

    #[test]
    fn test_dbsize_and_flushall() {
        let mut db = Db::default();
        run(&mut db, "SET", &["a", "1"]).unwrap();
        run(&mut db, "SADD", &["b", "x"]).unwrap();
        assert_eq!(run(&mut db, "DBSIZE", &[]).unwrap(), Value::Integer(2));
        assert_eq!(run(&mut db, "FLUSHALL", &[]).unwrap(), ok());
        assert_eq!(run(&mut db, "DBSIZE", &[]).unwrap(), Value::Integer(0));
    }

    #[test]
    fn test_unrepresentable_expiry_rejected() {
        let mut db = Db::default();
        run(&mut db, "SET", &["k", "v"]).unwrap();
        let max = i64::MAX.to_string();

        assert_eq!(
            run(&mut db, "SET", &["k", "v", "EX", &max]).unwrap_err(),
            Error::command("ERR invalid expire time in 'set' command")
        );
        assert_eq!(
            run(&mut db, "SET", &["k", "v", "PX", &max]).unwrap_err(),
            Error::command("ERR invalid expire time in 'set' command")
        );
        assert_eq!(
            run(&mut db, "EXPIRE", &["k", &max]).unwrap_err(),
            Error::command("ERR invalid expire time in 'expire' command")
        );
        assert_eq!(
            run(&mut db, "PEXPIRE", &["k", &max]).unwrap_err(),
            Error::command("ERR invalid expire time in 'pexpire' command")
        );

        // The key is untouched and still persistent.
        assert_eq!(run(&mut db, "GET", &["k"]).unwrap(), Value::from("v"));
        assert_eq!(run(&mut db, "PTTL", &["k"]).unwrap(), Value::Integer(-1));
    }

    #[test]
    fn test_ping() {
        let mut db = Db::default();
        assert_eq!(run(&mut db, "PING", &[]).unwrap(), Value::from("PONG"));
        assert_eq!(run(&mut db, "PING", &["hi"]).unwrap(), Value::from("hi"));
    }
}

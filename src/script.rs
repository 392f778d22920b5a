//! Server-side scripts for the operations that must read and mutate in one
//! indivisible step.
//!
//! The script text is part of the wire contract: a store (or a proxy caching
//! scripts by digest) sees exactly these bodies. Changing a body means
//! bumping its `version`.

#[derive(Debug, PartialEq, Eq)]
pub struct Script {
    pub name: &'static str,
    pub version: u32,
    pub body: &'static str,
}

/// `KEYS[1]` set, `ARGV[1]` rank (0 or -1). Returns the removed member or nil.
///
/// Stores that cached the older two-argument form (`ARGV[1]`, `ARGV[2]` as
/// start and stop of a one-rank range) see a different digest: this body takes
/// the rank once and uses it for both ends.
pub const POLL: Script = Script {
    name: "poll",
    version: 1,
    body: "local v = redis.call('zrange', KEYS[1], ARGV[1], ARGV[1]); \
           if v[1] ~= nil then \
               redis.call('zremrangebyrank', KEYS[1], ARGV[1], ARGV[1]); \
               return v[1]; \
           end \
           return nil;",
};

/// `ARGV` candidates. Returns 1 when every candidate is a member.
pub const CONTAINS_ALL: Script = Script {
    name: "contains_all",
    version: 1,
    body: "for j = 1, #ARGV do \
               if redis.call('zscore', KEYS[1], ARGV[j]) == false then \
                   return 0; \
               end \
           end \
           return 1;",
};

/// `ARGV` candidates. `unpack` is bounded by the Lua stack, hence the inner
/// 5000-member steps. Returns 1 when anything was removed.
pub const REMOVE_ALL: Script = Script {
    name: "remove_all",
    version: 1,
    body: "local v = 0; \
           for i = 1, #ARGV, 5000 do \
               v = v + redis.call('zrem', KEYS[1], unpack(ARGV, i, math.min(i + 4999, #ARGV))); \
           end \
           if v > 0 then return 1 end \
           return 0;",
};

/// `ARGV` members to keep. Returns 1 when anything was removed.
pub const RETAIN_ALL: Script = Script {
    name: "retain_all",
    version: 1,
    body: "local keep = {}; \
           for j = 1, #ARGV do keep[ARGV[j]] = true end \
           local changed = 0; \
           local s = redis.call('zrange', KEYS[1], 0, -1); \
           for i = 1, #s do \
               if not keep[s[i]] then \
                   redis.call('zrem', KEYS[1], s[i]); \
                   changed = 1; \
               end \
           end \
           return changed;",
};

pub const ALL: [&Script; 4] = [&POLL, &CONTAINS_ALL, &REMOVE_ALL, &RETAIN_ALL];

pub fn by_name(name: &str) -> Option<&'static Script> {
    ALL.into_iter().find(|s| s.name == name)
}

//! Lua scripts backing the atomic operations of [`super::RedisStore`].

/// KEYS: remaining, limit, window, global counter, global block.
/// ARGV: has_bucket, fallback_limit, fallback_window_ms, has_global, global_limit,
/// global_ttl_ms.
/// Returns {status, remaining}: status 1 allowed, 0 bucket exhausted, -2 global block,
/// -3 global window exhausted. remaining is -1 when no bucket was consulted.
pub const CONSUME: &str = r#"
if ARGV[4] == '1' then
  if redis.call('EXISTS', KEYS[5]) == 1 then
    return {-2, -1}
  end
  local used = tonumber(redis.call('GET', KEYS[4]) or '0')
  if used >= tonumber(ARGV[5]) then
    return {-3, -1}
  end
end
local remaining = -1
if ARGV[1] == '1' then
  local current = redis.call('GET', KEYS[1])
  if current then
    if tonumber(current) <= 0 then
      return {0, 0}
    end
    remaining = redis.call('DECR', KEYS[1])
  else
    local limit = tonumber(redis.call('GET', KEYS[2]) or ARGV[2])
    local window = tonumber(redis.call('GET', KEYS[3]) or ARGV[3])
    if limit <= 0 then
      return {0, 0}
    end
    remaining = limit - 1
    redis.call('SET', KEYS[1], remaining, 'PX', window)
  end
end
if ARGV[4] == '1' then
  redis.call('INCR', KEYS[4])
  redis.call('PEXPIRE', KEYS[4], ARGV[6])
end
return {1, remaining}
"#;

/// KEYS: remaining, limit, window, reset.
/// ARGV: remaining, limit, reset_at_ms, window_ms (0 when unknown), metadata_ttl_ms,
/// tolerance_ms.
pub const RECORD_REMAINING: &str = r#"
local server = tonumber(ARGV[1])
local reset_at = tonumber(ARGV[3])
local current = redis.call('GET', KEYS[1])
local known_reset = tonumber(redis.call('GET', KEYS[4]) or '0')
local value = server
if current and (known_reset == 0 or reset_at <= known_reset + tonumber(ARGV[6])) then
  value = math.min(tonumber(current), server)
end
redis.call('SET', KEYS[1], value, 'PXAT', reset_at)
redis.call('SET', KEYS[4], reset_at, 'PXAT', reset_at)
redis.call('SET', KEYS[2], ARGV[2], 'PX', ARGV[5])
if tonumber(ARGV[4]) > 0 then
  redis.call('SET', KEYS[3], ARGV[4], 'PX', ARGV[5])
end
return value
"#;

/// KEYS: counter. ARGV: delta, ttl_ms.
pub const INCR_WITH_TTL: &str = r#"
local value = redis.call('INCRBY', KEYS[1], ARGV[1])
if redis.call('PTTL', KEYS[1]) < 0 then
  redis.call('PEXPIRE', KEYS[1], ARGV[2])
end
return value
"#;

/// KEYS: queue. ARGV: now_ms.
pub const POP_DUE: &str = r#"
local items = redis.call('ZRANGEBYSCORE', KEYS[1], '-inf', ARGV[1], 'LIMIT', 0, 1)
if #items == 0 then
  return false
end
redis.call('ZREM', KEYS[1], items[1])
return items[1]
"#;

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[yare::parameterized(
    plain      = { "guest",     "guest" },
    at_sign    = { "p@ss",      "p%40ss" },
    colon      = { "a:b",       "a%3Ab" },
    slash      = { "a/b",       "a%2Fb" },
    unreserved = { "A-z_0.9~",  "A-z_0.9~" },
)]
fn userinfo_escaping(raw: &str, expected: &str) {
    assert_eq!(escape_userinfo(raw), expected);
}

#[yare::parameterized(
    user_and_password = { Some("guest"), Some("p@ss"), "amqp://guest:p%40ss@mq:5672/" },
    password_only     = { None,          Some("pw"),   "amqp://:pw@mq:5672/" },
    anonymous         = { None,          None,         "amqp://mq:5672/" },
    empty_user        = { Some(""),      None,         "amqp://mq:5672/" },
)]
fn uri_shapes(user: Option<&str>, password: Option<&str>, expected: &str) {
    assert_eq!(build("amqp", user, password, "mq", 5672, "/"), expected);
}

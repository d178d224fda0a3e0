/*
 * Copyright © 2025, United States Government, as represented by the Administrator of
 * the National Aeronautics and Space Administration. All rights reserved.
 *
 * The “ODIN” software is licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License. You may obtain a copy
 * of the License at http://www.apache.org/licenses/LICENSE-2.0.
 *
 * Unless required by applicable law or agreed to in writing, software distributed under
 * the License is distributed on an "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND,
 * either express or implied. See the License for the specific language governing permissions
 * and limitations under the License.
 */

//! common utility functions for JSON based http request/response operations

use reqwest::{header::{HeaderMap,HeaderValue,ACCEPT,CONTENT_TYPE}, Client, StatusCode, Response};
use serde::{de::DeserializeOwned,Serialize};

use crate::define_error;

define_error!{ pub OdinNetError = 
    NotFoundError(String) : "not found {0}",
    HttpError(#[from] reqwest::Error) : "http error: {0}",
    StatusError(String) : "response status error: {0}",
    ParseError(String) : "parse error: {0}"
}

pub type Result<T> = std::result::Result<T, OdinNetError>;

fn json_headers ()->HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
    headers
}

/// turn non-success responses into errors so that callers only have to deal with 2xx bodies
fn check_status (url: &str, response: Response)->Result<Response> {
    match response.status() {
        s if s.is_success() => Ok(response),
        StatusCode::NOT_FOUND => Err( OdinNetError::NotFoundError( url.to_string())),
        other => Err( OdinNetError::StatusError( format!("{url} -> {other}")))
    }
}

/// GET `url` and deserialize the JSON body
pub async fn get_json<T> (client: &Client, url: &str)->Result<T> where T: DeserializeOwned {
    let response = client.get(url).headers( json_headers()).send().await?;
    let response = check_status( url, response)?;
    from_json( response).await
}

/// PATCH `url` with a JSON body. We don't care about the response body, only the status
pub async fn patch_json<T> (client: &Client, url: &str, data: &T)->Result<()> where T: Serialize {
    let mut headers = json_headers();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

    let response = client.patch(url).headers(headers).json(data).send().await?;
    check_status( url, response)?;
    Ok(())
}

pub async fn from_json<T> (response: Response)->Result<T> where T: DeserializeOwned {
    let bytes = response.bytes().await?;
    serde_json::from_slice( &bytes).map_err(|e| OdinNetError::ParseError(e.to_string()))
}

// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! HTML pages for the browser upload flow

use ammonia::clean_text;

pub const PAGE_TITLE: &str = "Image Caption Generator";
pub const PAGE_SUBTITLE: &str = "Upload an image and generate a caption using a trained model";

/// File types offered by the upload dialog
pub const ACCEPTED_TYPES: &str = ".jpg,.jpeg,.png";

const STYLE: &str = "body{font-family:sans-serif;max-width:720px;margin:2rem auto;padding:0 1rem}\
img{max-width:100%;height:auto;border-radius:4px}\
.caption{color:blue}\
.error{color:#b00020}";

fn layout(body: &str) -> String {
    format!(
        "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n\
         <title>{title}</title>\n<style>{style}</style>\n</head>\n<body>\n\
         <h1>{title}</h1>\n<p>{subtitle}</p>\n{body}\n</body>\n</html>\n",
        title = PAGE_TITLE,
        subtitle = PAGE_SUBTITLE,
        style = STYLE,
        body = body,
    )
}

fn upload_form() -> String {
    format!(
        "<form action=\"/caption\" method=\"post\" enctype=\"multipart/form-data\">\n\
         <input type=\"file\" name=\"image\" accept=\"{}\" required>\n\
         <button type=\"submit\">Generate caption</button>\n</form>",
        ACCEPTED_TYPES
    )
}

/// Landing page with the upload form
pub fn upload_page() -> String {
    layout(&upload_form())
}

/// The uploaded image with its caption as a blue title
///
/// `image_data_uri` must come from `encode_data_uri`; only the caption is escaped.
pub fn result_page(image_data_uri: &str, caption: &str) -> String {
    let body = format!(
        "<figure>\n<img src=\"{src}\" alt=\"{alt}\">\n\
         <figcaption><h2 class=\"caption\">{caption}</h2></figcaption>\n</figure>\n{form}",
        src = image_data_uri,
        alt = clean_text(caption),
        caption = clean_text(caption),
        form = upload_form(),
    );
    layout(&body)
}

pub fn error_page(message: &str) -> String {
    let body = format!(
        "<p class=\"error\">{}</p>\n{}",
        clean_text(message),
        upload_form()
    );
    layout(&body)
}

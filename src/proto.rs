//! Protobuf messages accepted and returned by the send endpoint.

pub mod courier {
    pub mod v1 {
        #[derive(Clone, PartialEq, Eq, prost::Message)]
        pub struct Attachment {
            #[prost(string, tag = "1")]
            pub filename: String,
            #[prost(bytes = "vec", tag = "2")]
            pub content: Vec<u8>,
            #[prost(string, tag = "3")]
            pub content_type: String,
        }

        #[derive(Clone, PartialEq, Eq, prost::Message)]
        pub struct SendEmailRequest {
            #[prost(string, repeated, tag = "1")]
            pub to: Vec<String>,
            #[prost(string, repeated, tag = "2")]
            pub cc: Vec<String>,
            #[prost(string, repeated, tag = "3")]
            pub bcc: Vec<String>,
            #[prost(string, tag = "4")]
            pub subject: String,
            #[prost(string, tag = "5")]
            pub body: String,
            #[prost(bool, tag = "6")]
            pub is_html: bool,
            #[prost(message, repeated, tag = "7")]
            pub attachments: Vec<Attachment>,
        }

        #[derive(Clone, PartialEq, Eq, prost::Message)]
        pub struct SendEmailResponse {
            #[prost(string, tag = "1")]
            pub id: String,
            #[prost(string, tag = "2")]
            pub status: String,
            #[prost(string, tag = "3")]
            pub message: String,
            /// RFC 3339 timestamp.
            #[prost(string, tag = "4")]
            pub created_at: String,
        }
    }
}
